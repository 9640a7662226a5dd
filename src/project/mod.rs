//! Project management: configuration, file watching, and the bounded
//! task scheduler.

mod config;
mod scheduler;
mod watcher;

pub use config::{Config, FormatMode, RenameScope, WatcherMode};
pub use scheduler::{TaskQueue, TaskQueueStats};
pub use watcher::{FileEvent, FileEventKind, Watcher, WatcherStatus};

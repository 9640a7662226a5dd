//! Bounded-concurrency task queue.
//!
//! Background rebuilds (workspace indexing, workspace diagnostics, bulk
//! rename edits) queue here so they never starve interactive queries.
//! Default concurrency is 2 with a 60-second per-task timeout; a timed
//! out task has its cancellation token tripped and its partial results
//! are discarded by the task itself.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Counters surfaced by the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskQueueStats {
    pub queued: usize,
    pub running: usize,
    pub completed: u64,
    pub timed_out: u64,
}

type Job = Box<dyn FnOnce(&CancellationToken) + Send + 'static>;

struct QueuedTask {
    id: u64,
    label: &'static str,
    job: Job,
}

struct RunningTask {
    id: u64,
    deadline: Instant,
    token: CancellationToken,
}

struct QueueState {
    queue: VecDeque<QueuedTask>,
    running: Vec<RunningTask>,
    completed: u64,
    timed_out: u64,
    next_id: u64,
    shutdown: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    work_ready: Condvar,
    timeout: Duration,
}

/// FIFO task queue with a fixed worker pool.
pub struct TaskQueue {
    inner: Arc<QueueInner>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl TaskQueue {
    pub const DEFAULT_CONCURRENCY: usize = 2;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        let inner = Arc::new(QueueInner {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                running: Vec::new(),
                completed: 0,
                timed_out: 0,
                next_id: 1,
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            timeout,
        });

        let mut workers = Vec::new();
        for worker_id in 0..concurrency.max(1) {
            let inner = Arc::clone(&inner);
            workers.push(
                std::thread::Builder::new()
                    .name(format!("prose-task-{worker_id}"))
                    .spawn(move || worker_loop(inner))
                    .unwrap_or_else(|e| panic!("spawning task worker failed: {e}")),
            );
        }
        // The monitor trips cancellation tokens of overdue tasks.
        {
            let inner = Arc::clone(&inner);
            workers.push(
                std::thread::Builder::new()
                    .name("prose-task-monitor".to_string())
                    .spawn(move || monitor_loop(inner))
                    .unwrap_or_else(|e| panic!("spawning task monitor failed: {e}")),
            );
        }

        Self { inner, workers }
    }

    /// Enqueue a background task. The job receives a cancellation token
    /// it must honor at its suspension points.
    pub fn submit<F>(&self, label: &'static str, job: F) -> u64
    where
        F: FnOnce(&CancellationToken) + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.queue.push_back(QueuedTask {
            id,
            label,
            job: Box::new(job),
        });
        debug!(id, label, "task queued");
        drop(state);
        self.inner.work_ready.notify_one();
        id
    }

    pub fn stats(&self) -> TaskQueueStats {
        let state = self.inner.state.lock();
        TaskQueueStats {
            queued: state.queue.len(),
            running: state.running.len(),
            completed: state.completed,
            timed_out: state.timed_out,
        }
    }

    /// Wait until the queue is idle, for tests and orderly shutdown.
    pub fn drain(&self, max_wait: Duration) -> bool {
        let deadline = Instant::now() + max_wait;
        loop {
            {
                let state = self.inner.state.lock();
                if state.queue.is_empty() && state.running.is_empty() {
                    return true;
                }
            }
            if Instant::now() > deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn shutdown(mut self) {
        {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
        }
        self.inner.work_ready.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CONCURRENCY, Self::DEFAULT_TIMEOUT)
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.shutdown = true;
        drop(state);
        self.inner.work_ready.notify_all();
        // Workers are detached if the owner did not call shutdown();
        // they exit at the next wakeup.
    }
}

fn worker_loop(inner: Arc<QueueInner>) {
    loop {
        let task = {
            let mut state = inner.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(task) = state.queue.pop_front() {
                    break task;
                }
                inner.work_ready.wait(&mut state);
            }
        };

        let token = CancellationToken::new();
        {
            let mut state = inner.state.lock();
            state.running.push(RunningTask {
                id: task.id,
                deadline: Instant::now() + inner.timeout,
                token: token.clone(),
            });
        }

        debug!(id = task.id, label = task.label, "task started");
        (task.job)(&token);

        let mut state = inner.state.lock();
        let was_timed_out = token.is_cancelled();
        state.running.retain(|r| r.id != task.id);
        if was_timed_out {
            state.timed_out += 1;
            warn!(id = task.id, label = task.label, "task cancelled by timeout");
        } else {
            state.completed += 1;
        }
    }
}

fn monitor_loop(inner: Arc<QueueInner>) {
    loop {
        {
            let state = inner.state.lock();
            if state.shutdown {
                return;
            }
            let now = Instant::now();
            for task in &state.running {
                if now >= task.deadline && !task.token.is_cancelled() {
                    task.token.cancel();
                }
            }
        }
        std::thread::sleep(Duration::from_millis(250));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_tasks_run_and_complete() {
        let queue = TaskQueue::new(2, Duration::from_secs(5));
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            queue.submit("count", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(queue.drain(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert_eq!(queue.stats().completed, 8);
        queue.shutdown();
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let queue = TaskQueue::new(2, Duration::from_secs(5));
        let peak = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        for _ in 0..6 {
            let peak = Arc::clone(&peak);
            let active = Arc::clone(&active);
            queue.submit("probe", move |_| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }
        assert!(queue.drain(Duration::from_secs(5)));
        assert!(peak.load(Ordering::SeqCst) <= 2);
        queue.shutdown();
    }

    #[test]
    fn test_timeout_cancels_token() {
        let queue = TaskQueue::new(1, Duration::from_millis(100));
        let observed = Arc::new(AtomicUsize::new(0));
        {
            let observed = Arc::clone(&observed);
            queue.submit("slow", move |token| {
                // Cooperative task: loop until cancelled.
                for _ in 0..100 {
                    if token.is_cancelled() {
                        observed.store(1, Ordering::SeqCst);
                        return;
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
            });
        }
        assert!(queue.drain(Duration::from_secs(10)));
        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert_eq!(queue.stats().timed_out, 1);
        queue.shutdown();
    }
}

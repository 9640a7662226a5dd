//! Static analysis over the Core IR: the type system, the type checker,
//! effect inference, capability enforcement, and PII taint analysis.
//!
//! Every pass produces a diagnostic list and never aborts; phase
//! boundaries return, they do not throw.

pub mod capability;
pub mod check;
pub mod effects;
pub mod manifest;
pub mod pii;
pub mod types;

pub use capability::check_capabilities;
pub use check::{check_module, CheckResult, FuncSig, ModuleContext};
pub use effects::{infer_effects, EffectOutcome, EffectSignature};
pub use manifest::{CapabilityManifest, ManifestCache, ManifestError, ManifestState};
pub use pii::{analyze_pii, is_pii_tainted, pii_params};

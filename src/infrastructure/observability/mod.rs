//! Training and fallback diagnostics.
//!
//! Records are emitted through `tracing` only. A one-line JSON snapshot of
//! every training run is logged with a `TRAINING_JSON:` prefix so log
//! shippers can pick it out.

pub mod reporter;

pub use reporter::{TracingDiagnostics, TrainingSnapshot};

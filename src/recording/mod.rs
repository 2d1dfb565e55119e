//! Run recording for headless microcosm simulations.
//!
//! A run folder holds:
//!
//! ```text
//! config.json          configuration snapshot, written on creation
//! timeseries.jsonl     one StepRecord per recorded tick
//! audits.jsonl         one AuditReport per audit
//! physics_audit.txt    human-readable audit log
//! metadata.json        RunMetadata, written on finish
//! ```

mod recorder;

pub use recorder::{RecorderConfig, RecordingStats, RunRecorder};

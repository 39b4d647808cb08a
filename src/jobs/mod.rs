//! Forecast jobs
//!
//! ```text
//! create --> job dir + snapshot --> launch --> trainer child
//!                                      │            │
//!                               status.json <── supervisor
//! ```

pub mod orchestrator;
pub mod process;
pub mod status;
pub mod supervisor;
pub mod trainer;

pub use orchestrator::{JobOrchestrator, JobOverview};
pub use status::{JobState, StatusHandle, StatusRecord, STATUS_FILE};
pub use supervisor::JobCompletion;
pub use trainer::{TrainerEntrypoint, TrainerInvocation, TrainerResult, RESULT_FILE};

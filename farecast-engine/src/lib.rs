pub mod error;
pub mod orchestrator;
pub mod quota;
pub mod resiliency;
pub mod state;
pub mod telemetry;

pub use error::{EngineError, EngineResult};
pub use orchestrator::{AggregationOrchestrator, EngineHealth};
pub use quota::{QuotaUsage, RequestQuota};
pub use resiliency::{Backoff, BreakerPolicy, BreakerSnapshot, CircuitState, FailureState, FailureTracker};
pub use state::{EngineSettings, EngineState};

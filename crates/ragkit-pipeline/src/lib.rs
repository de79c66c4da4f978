#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod bootstrap;
pub mod context;
pub mod health;
pub mod orchestrator;

pub use bootstrap::bootstrap;
pub use context::ContextAssembler;
pub use health::{HealthReport, HealthStatus, ServiceStatus};
pub use orchestrator::{
    IndexRequest, IndexResponse, IndexStage, PipelineError, QueryLimits, QueryRequest, QueryResponse, QueryStage,
    RagPipeline, Source, Stage,
};

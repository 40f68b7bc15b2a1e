//! Core library for the RAPR pipeline: building a labeled dataset of
//! rejected agent-authored pull requests and the final review comment that
//! likely blocked each one.

pub mod artifacts;
pub mod config;
pub mod model;
pub mod sampling;
pub mod source;
pub mod stages;
pub mod task_type;

pub use config::{CommentLink, PipelineConfig};
pub use model::{AgentPr, CommentRow, FinalBlockingComment, PrAggregate, PrOutcome, SampledPr};
pub use sampling::{stratified_sample, StratumCount};
pub use task_type::infer_task_type;

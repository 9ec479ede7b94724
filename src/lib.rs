// Trade Signal Agent
// Point-in-time fusion of price, news and insider signals into one Buy/Sell/Hold decision

pub mod analysis;
pub mod config;
pub mod decision;
pub mod error;
pub mod pipeline;
pub mod sources;
pub mod types;

pub use config::Config;
pub use decision::{Action, DecisionRecord, DecisionRequest};
pub use error::{BranchError, OracleError, PipelineError, SourceError};
pub use pipeline::SignalPipeline;
pub use types::{Domain, ScoreResult, SignalLabel};

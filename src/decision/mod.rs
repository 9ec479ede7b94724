pub mod assembler;
pub mod oracle;
pub mod request;

pub use assembler::{parse_reply, Action, DecisionAssembler, DecisionRecord, RetryPolicy};
pub use oracle::{GeminiOracle, ReasoningOracle};
pub use request::{DecisionRequest, DomainInput};

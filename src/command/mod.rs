//! Command pipeline
//!
//! text -> Clarifier -> ActionModel -> SchemaValidator -> ActionResolver,
//! with the ReplanningLoop feeding rejections and failures back to the model.

pub mod clarify;
pub mod interpreter;
pub mod replan;
pub mod resolver;

pub use clarify::{Clarifier, Clarity};
pub use interpreter::{Interpreter, Outcome};
pub use replan::{AttemptOutcome, AttemptRecord, ReplanOutcome, ReplanningLoop};
pub use resolver::ActionResolver;

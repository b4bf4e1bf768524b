//! Structured robot actions
//!
//! Whatever leaves this module is typed and validated; backends consume
//! [`Plan`] values and never parse free text.

pub mod action;
pub mod validator;
pub mod vocabulary;

pub use action::{
    Action, ActionName, ArgValue, CandidateAction, CandidatePlan, Constraints, Grasp,
    MotionGlobals, Plan,
};
pub use validator::{Rejection, RejectionCode, SchemaValidator};
pub use vocabulary::{ActionSignature, ActionVocabulary, ParamKind, ParamSpec};

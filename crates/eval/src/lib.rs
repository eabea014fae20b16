//! qti-eval: the assessment item runtime.
//!
//! Evaluates expression trees against a variable state, runs
//! response-processing rule programs, and drives the item session state
//! machine (attempts, timing, suspension and completion).
//!
//! Everything is synchronous and deterministic: the only external input
//! affecting behavior is the time reported through
//! `AssessmentItemSession::set_time`.

pub mod error;
pub mod evaluate;
pub mod numeric;
pub mod operators;
pub mod policy;
pub mod rules;
pub mod session;
pub mod state;

pub use error::{ExpressionError, RuleError, SessionError, SessionErrorKind, StateError};
pub use evaluate::eval_expr;
pub use policy::{SessionPolicy, StaticSessionPolicy};
pub use rules::process_response;
pub use session::{AssessmentItemSession, CompletionStatus, ResponseSet, SessionState};
pub use state::{Variable, VariableKind, VariableState};

//! Error taxonomy of the runtime.
//!
//! Expression errors are always fatal to the tree being evaluated; rule
//! errors wrap them; session errors carry the item identifier and the
//! session state at the time of the failure.

use qti_core::ValueError;

use crate::session::SessionState;

/// Variable lookup and assignment failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("unknown variable '{identifier}'")]
    UnknownVariable { identifier: String },

    #[error("cannot assign {got} to variable '{identifier}' declared as {expected}")]
    IncompatibleValue {
        identifier: String,
        expected: String,
        got: String,
    },
}

/// Expression evaluation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("operator '{operator}' expects {expected} operand(s), got {actual}")]
    OperandCount {
        operator: &'static str,
        expected: String,
        actual: usize,
    },

    /// `index` is the 0-based position of the offending operand.
    #[error("operator '{operator}', operand {index}: {message}")]
    OperandType {
        operator: &'static str,
        index: usize,
        message: String,
    },

    #[error("unknown variable '{identifier}'")]
    UnknownVariable { identifier: String },

    /// e.g. `correct` applied to an outcome variable.
    #[error("'{expression}' requires a {expected} variable, '{identifier}' is not one")]
    WrongVariableKind {
        expression: &'static str,
        identifier: String,
        expected: &'static str,
    },

    #[error("operator '{operator}': numeric overflow")]
    Overflow { operator: &'static str },

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Response-processing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("setOutcomeValue target '{identifier}' is not an outcome variable")]
    NotAnOutcome { identifier: String },

    #[error("responseCondition expects a boolean condition, got {got}")]
    NonBooleanCondition { got: String },
}

/// Discriminant of a `SessionError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionErrorKind {
    AttemptsOverflow,
    DurationOverflow,
    DurationUnderflow,
    StateViolation,
    SkippingForbidden,
    Runtime,
    Variable,
}

/// Item session failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("item '{item}' ({state}): {message}")]
    AttemptsOverflow {
        item: String,
        state: SessionState,
        message: String,
    },

    #[error("item '{item}' ({state}): {message}")]
    DurationOverflow {
        item: String,
        state: SessionState,
        message: String,
    },

    #[error("item '{item}' ({state}): {message}")]
    DurationUnderflow {
        item: String,
        state: SessionState,
        message: String,
    },

    #[error("item '{item}' ({state}): {message}")]
    StateViolation {
        item: String,
        state: SessionState,
        message: String,
    },

    #[error("item '{item}' ({state}): {message}")]
    SkippingForbidden {
        item: String,
        state: SessionState,
        message: String,
    },

    /// Response processing failed; the rule error is kept as the source.
    #[error("response processing failed for item '{item}' ({state})")]
    Runtime {
        item: String,
        state: SessionState,
        #[source]
        source: RuleError,
    },

    #[error(transparent)]
    Variable(#[from] StateError),
}

impl SessionError {
    pub fn kind(&self) -> SessionErrorKind {
        match self {
            SessionError::AttemptsOverflow { .. } => SessionErrorKind::AttemptsOverflow,
            SessionError::DurationOverflow { .. } => SessionErrorKind::DurationOverflow,
            SessionError::DurationUnderflow { .. } => SessionErrorKind::DurationUnderflow,
            SessionError::StateViolation { .. } => SessionErrorKind::StateViolation,
            SessionError::SkippingForbidden { .. } => SessionErrorKind::SkippingForbidden,
            SessionError::Runtime { .. } => SessionErrorKind::Runtime,
            SessionError::Variable(_) => SessionErrorKind::Variable,
        }
    }

    /// Session state when the error was raised; `None` for variable errors.
    pub fn state(&self) -> Option<SessionState> {
        match self {
            SessionError::AttemptsOverflow { state, .. }
            | SessionError::DurationOverflow { state, .. }
            | SessionError::DurationUnderflow { state, .. }
            | SessionError::StateViolation { state, .. }
            | SessionError::SkippingForbidden { state, .. }
            | SessionError::Runtime { state, .. } => Some(*state),
            SessionError::Variable(_) => None,
        }
    }

    /// Identifier of the item whose session raised the error.
    pub fn item(&self) -> Option<&str> {
        match self {
            SessionError::AttemptsOverflow { item, .. }
            | SessionError::DurationOverflow { item, .. }
            | SessionError::DurationUnderflow { item, .. }
            | SessionError::StateViolation { item, .. }
            | SessionError::SkippingForbidden { item, .. }
            | SessionError::Runtime { item, .. } => Some(item),
            SessionError::Variable(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn runtime_error_keeps_cause() {
        let err = SessionError::Runtime {
            item: "q1".to_string(),
            state: SessionState::Interacting,
            source: RuleError::NotAnOutcome {
                identifier: "RESPONSE".to_string(),
            },
        };
        assert_eq!(err.kind(), SessionErrorKind::Runtime);
        assert_eq!(err.state(), Some(SessionState::Interacting));
        assert_eq!(err.item(), Some("q1"));
        let cause = err.source().map(|s| s.to_string());
        assert_eq!(
            cause.as_deref(),
            Some("setOutcomeValue target 'RESPONSE' is not an outcome variable")
        );
    }

    #[test]
    fn operand_type_message_names_operator_and_index() {
        let err = ExpressionError::OperandType {
            operator: "ordered",
            index: 2,
            message: "cardinality record is not accepted".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "operator 'ordered', operand 2: cardinality record is not accepted"
        );
    }
}

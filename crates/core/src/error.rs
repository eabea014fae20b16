use crate::values::{BaseType, Cardinality};

/// Errors raised while constructing a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// A container element does not share the container's base type.
    #[error("{container} container of base type {expected} cannot hold a value of base type {actual}")]
    BaseTypeMismatch {
        container: Cardinality,
        expected: BaseType,
        actual: BaseType,
    },

    #[error("record field keys must not be empty")]
    EmptyRecordKey,
}

/// Errors raised while validating an item definition or one of its
/// declarations. A definition that fails validation is never bound to a
/// session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("variable '{identifier}' is declared more than once in item '{item}'")]
    DuplicateVariable { item: String, identifier: String },

    /// `numAttempts`, `duration` and `completionStatus` are built in.
    #[error("variable '{0}' is reserved for built-in use")]
    ReservedIdentifier(String),

    #[error("correct response of '{0}' must contain at least one value")]
    EmptyCorrectResponse(String),

    #[error("interpolation table of '{0}' must contain at least one entry")]
    EmptyInterpolationTable(String),

    /// A declared default or correct response does not match the
    /// declaration's cardinality and base type.
    #[error("{what} of '{identifier}' is {got}, expected {expected}")]
    IncompatibleValue {
        identifier: String,
        what: &'static str,
        expected: String,
        got: String,
    },

    #[error("response processing of item '{item}' references undeclared variable '{identifier}'")]
    UndeclaredVariable { item: String, identifier: String },
}

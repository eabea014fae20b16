//! qti-core: the passive data model of assessment items.
//!
//! Typed values, variable declarations, item definitions, expression
//! trees and response-processing rule programs, plus the session policy
//! objects (`ItemSessionControl`, `TimeLimits`, navigation and submission
//! modes). Nothing here evaluates anything; `qti-eval` consumes these types.

pub mod control;
pub mod error;
pub mod expression;
pub mod item;
pub mod rules;
pub mod values;

pub use control::{ItemSessionControl, NavigationMode, SubmissionMode, TimeLimits};
pub use error::{DefinitionError, ValueError};
pub use expression::{Expression, OperandType, Operator, Signature};
pub use item::{
    ItemDefinition, LookupTable, MapEntry, Mapping, OutcomeDeclaration, ResponseDeclaration,
    COMPLETION_STATUS, DURATION, NUM_ATTEMPTS,
};
pub use rules::{ConditionalBranch, ResponseCondition, ResponseProcessing, ResponseRule};
pub use values::{
    BaseType, Cardinality, Container, ContainerKind, DirectedPair, Pair, Point, Record, Scalar,
    Value,
};

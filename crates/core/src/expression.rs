//! Expression trees and operator signatures.
//!
//! An expression is a leaf (literal, variable lookup, correct/default
//! lookup, response mapping, NULL) or an operator applied to operand
//! sub-expressions. Operators form a closed set; each declares a
//! `Signature` that the evaluator checks before applying the operator.

use crate::values::{BaseType, Cardinality, Scalar};

/// A node of an expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// Literal scalar.
    BaseValue(Scalar),
    /// Current value of a variable.
    Variable(String),
    /// Declared correct response of a response variable.
    Correct(String),
    /// Default value of a variable.
    Default(String),
    /// Value of a response variable looked up in its mapping.
    MapResponse(String),
    Null,
    Operator {
        operator: Operator,
        operands: Vec<Expression>,
    },
}

impl Expression {
    pub fn operator(operator: Operator, operands: Vec<Expression>) -> Self {
        Expression::Operator { operator, operands }
    }

    pub fn variable(identifier: &str) -> Self {
        Expression::Variable(identifier.to_string())
    }

    pub fn integer(i: i64) -> Self {
        Expression::BaseValue(Scalar::Integer(i))
    }

    pub fn boolean(b: bool) -> Self {
        Expression::BaseValue(Scalar::Boolean(b))
    }

    pub fn identifier(s: &str) -> Self {
        Expression::BaseValue(Scalar::Identifier(s.to_string()))
    }

    /// Operand sub-expressions. Leaves have none.
    pub fn children(&self) -> &[Expression] {
        match self {
            Expression::Operator { operands, .. } => operands,
            _ => &[],
        }
    }

    /// Identifier of the variable this node reads directly, if any.
    pub fn variable_reference(&self) -> Option<&str> {
        match self {
            Expression::Variable(id)
            | Expression::Correct(id)
            | Expression::Default(id)
            | Expression::MapResponse(id) => Some(id),
            _ => None,
        }
    }

    /// Every variable read anywhere in the tree, first occurrence order.
    pub fn referenced_variables(&self) -> Vec<&str> {
        let mut found = Vec::new();
        collect_references(self, &mut found);
        found
    }
}

fn collect_references<'a>(expr: &'a Expression, found: &mut Vec<&'a str>) {
    if let Some(id) = expr.variable_reference() {
        if !found.contains(&id) {
            found.push(id);
        }
    }
    for child in expr.children() {
        collect_references(child, found);
    }
}

// ──────────────────────────────────────────────
// Operators
// ──────────────────────────────────────────────

/// The closed set of operators understood by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Multiple,
    Ordered,
    ContainerSize,
    IsNull,
    /// 1-based element access into an ordered container.
    Index(usize),
    FieldValue(String),
    Member,
    Delete,
    Contains,
    Not,
    And,
    Or,
    Match,
    StringMatch { case_sensitive: bool },
    Equal,
    Lt,
    Gt,
    Lte,
    Gte,
    DurationLt,
    DurationGte,
    Sum,
    Product,
    Subtract,
    Divide,
    IntegerDivide,
    IntegerModulus,
    Round,
    Truncate,
}

/// Base-type constraint entry of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// Any base type.
    Any,
    /// All non-null operands share the base type of the first one.
    Same,
    Base(BaseType),
}

/// Operand contract of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub min_operands: usize,
    /// `None` means unbounded.
    pub max_operands: Option<usize>,
    pub cardinalities: &'static [Cardinality],
    pub base_types: &'static [OperandType],
    /// Base types refused even when `base_types` would admit them.
    pub excluded_base_types: &'static [BaseType],
}

impl Signature {
    pub fn accepts_count(&self, n: usize) -> bool {
        n >= self.min_operands && self.max_operands.map_or(true, |max| n <= max)
    }

    /// e.g. "exactly 2", "at least 1", "between 0 and 3".
    pub fn describe_count(&self) -> String {
        match self.max_operands {
            None => format!("at least {}", self.min_operands),
            Some(max) if max == self.min_operands => format!("exactly {}", max),
            Some(max) => format!("between {} and {}", self.min_operands, max),
        }
    }

    pub fn requires_same_base_type(&self) -> bool {
        self.base_types.contains(&OperandType::Same)
    }

    pub fn accepts_any_base_type(&self) -> bool {
        self.base_types.contains(&OperandType::Any)
    }

    pub fn accepts_cardinality(&self, cardinality: Cardinality) -> bool {
        self.cardinalities.contains(&cardinality)
    }

    /// Explicit base-type membership. `Same` and `Any` are handled by the
    /// caller.
    pub fn accepts_base_type(&self, base_type: BaseType) -> bool {
        if self.excluded_base_types.contains(&base_type) {
            return false;
        }
        self.accepts_any_base_type()
            || self.requires_same_base_type()
            || self.base_types.contains(&OperandType::Base(base_type))
    }
}

use Cardinality::{Multiple as M, Ordered as O, Record as R, Single as S};

const SINGLE: &[Cardinality] = &[S];
const ANY_CARDINALITY: &[Cardinality] = &[S, M, O, R];
const NON_RECORD: &[Cardinality] = &[S, M, O];
const CONTAINERS: &[Cardinality] = &[M, O];

const ANY: &[OperandType] = &[OperandType::Any];
const SAME: &[OperandType] = &[OperandType::Same];
const BOOLEAN: &[OperandType] = &[OperandType::Base(BaseType::Boolean)];
const NUMERIC: &[OperandType] = &[
    OperandType::Base(BaseType::Integer),
    OperandType::Base(BaseType::Float),
];
const INTEGER: &[OperandType] = &[OperandType::Base(BaseType::Integer)];
const STRING: &[OperandType] = &[OperandType::Base(BaseType::String)];
const DURATION: &[OperandType] = &[OperandType::Base(BaseType::Duration)];

const NO_FLOAT_OR_DURATION: &[BaseType] = &[BaseType::Float, BaseType::Duration];

const fn sig(
    min_operands: usize,
    max_operands: Option<usize>,
    cardinalities: &'static [Cardinality],
    base_types: &'static [OperandType],
) -> Signature {
    Signature {
        min_operands,
        max_operands,
        cardinalities,
        base_types,
        excluded_base_types: &[],
    }
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Multiple => "multiple",
            Operator::Ordered => "ordered",
            Operator::ContainerSize => "containerSize",
            Operator::IsNull => "isNull",
            Operator::Index(_) => "index",
            Operator::FieldValue(_) => "fieldValue",
            Operator::Member => "member",
            Operator::Delete => "delete",
            Operator::Contains => "contains",
            Operator::Not => "not",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Match => "match",
            Operator::StringMatch { .. } => "stringMatch",
            Operator::Equal => "equal",
            Operator::Lt => "lt",
            Operator::Gt => "gt",
            Operator::Lte => "lte",
            Operator::Gte => "gte",
            Operator::DurationLt => "durationLT",
            Operator::DurationGte => "durationGTE",
            Operator::Sum => "sum",
            Operator::Product => "product",
            Operator::Subtract => "subtract",
            Operator::Divide => "divide",
            Operator::IntegerDivide => "integerDivide",
            Operator::IntegerModulus => "integerModulus",
            Operator::Round => "round",
            Operator::Truncate => "truncate",
        }
    }

    pub fn signature(&self) -> Signature {
        match self {
            Operator::Multiple => sig(0, None, &[S, M], SAME),
            Operator::Ordered => sig(0, None, &[S, O], SAME),
            Operator::ContainerSize => sig(1, Some(1), CONTAINERS, ANY),
            Operator::IsNull => sig(1, Some(1), ANY_CARDINALITY, ANY),
            Operator::Index(_) => sig(1, Some(1), &[O], ANY),
            Operator::FieldValue(_) => sig(1, Some(1), &[R], ANY),
            Operator::Member | Operator::Delete => Signature {
                excluded_base_types: NO_FLOAT_OR_DURATION,
                ..sig(2, Some(2), NON_RECORD, SAME)
            },
            Operator::Contains => Signature {
                excluded_base_types: NO_FLOAT_OR_DURATION,
                ..sig(2, Some(2), CONTAINERS, SAME)
            },
            Operator::Match => Signature {
                excluded_base_types: NO_FLOAT_OR_DURATION,
                ..sig(2, Some(2), ANY_CARDINALITY, SAME)
            },
            Operator::Not => sig(1, Some(1), SINGLE, BOOLEAN),
            Operator::And | Operator::Or => sig(1, None, SINGLE, BOOLEAN),
            Operator::StringMatch { .. } => sig(2, Some(2), SINGLE, STRING),
            Operator::Equal | Operator::Lt | Operator::Gt | Operator::Lte | Operator::Gte => {
                sig(2, Some(2), SINGLE, NUMERIC)
            }
            Operator::DurationLt | Operator::DurationGte => sig(2, Some(2), SINGLE, DURATION),
            Operator::Sum | Operator::Product => sig(1, None, NON_RECORD, NUMERIC),
            Operator::Subtract | Operator::Divide => sig(2, Some(2), SINGLE, NUMERIC),
            Operator::IntegerDivide | Operator::IntegerModulus => {
                sig(2, Some(2), SINGLE, INTEGER)
            }
            Operator::Round | Operator::Truncate => sig(1, Some(1), SINGLE, NUMERIC),
        }
    }
}

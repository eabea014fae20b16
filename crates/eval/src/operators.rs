//! Operator contracts and semantics.
//!
//! `check_operands` validates evaluated operands against an operator's
//! `Signature`: count first, then per-operand cardinality and base type,
//! then the SAME base-type constraint as a separate pass over all operands.
//! `apply` then computes the result. Neither ever turns a contract
//! violation into NULL.

use qti_core::{BaseType, Cardinality, Container, ContainerKind, Operator, Scalar, Value};

use crate::error::ExpressionError;
use crate::numeric::{self, Number};

// ──────────────────────────────────────────────
// Contract checks
// ──────────────────────────────────────────────

fn operand_error(operator: &Operator, index: usize, message: String) -> ExpressionError {
    ExpressionError::OperandType {
        operator: operator.name(),
        index,
        message,
    }
}

/// Validate operand count, cardinalities and base types.
///
/// NULL operands are exempt from the cardinality and base-type checks.
/// Records carry no base type and are exempt from the base-type checks.
pub fn check_operands(operator: &Operator, operands: &[Value]) -> Result<(), ExpressionError> {
    let signature = operator.signature();

    if !signature.accepts_count(operands.len()) {
        return Err(ExpressionError::OperandCount {
            operator: operator.name(),
            expected: signature.describe_count(),
            actual: operands.len(),
        });
    }

    for (index, operand) in operands.iter().enumerate() {
        let Some(cardinality) = operand.cardinality() else {
            continue;
        };
        if !signature.accepts_cardinality(cardinality) {
            return Err(operand_error(
                operator,
                index,
                format!("cardinality {} is not accepted", cardinality),
            ));
        }
        if let Some(base_type) = operand.base_type() {
            if !signature.accepts_base_type(base_type) {
                return Err(operand_error(
                    operator,
                    index,
                    format!("base type {} is not accepted", base_type),
                ));
            }
        }
    }

    if signature.requires_same_base_type() {
        check_same_base_type(operator, operands)?;
    }
    Ok(())
}

/// The reference base type is that of the first operand that is neither
/// NULL nor an empty container.
fn check_same_base_type(operator: &Operator, operands: &[Value]) -> Result<(), ExpressionError> {
    let mut reference: Option<BaseType> = None;
    for (index, operand) in operands.iter().enumerate() {
        if operand.is_null() {
            continue;
        }
        let Some(base_type) = operand.base_type() else {
            continue;
        };
        match reference {
            None => reference = Some(base_type),
            Some(expected) if expected != base_type => {
                return Err(operand_error(
                    operator,
                    index,
                    format!(
                        "base type {} does not match base type {} of the preceding operands",
                        base_type, expected
                    ),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Operand accessors
// ──────────────────────────────────────────────

fn scalar<'a>(
    operator: &Operator,
    index: usize,
    value: &'a Value,
) -> Result<&'a Scalar, ExpressionError> {
    value
        .as_scalar()
        .ok_or_else(|| {
            operand_error(
                operator,
                index,
                format!("expected a single value, got {}", value.type_name()),
            )
        })
}

fn boolean(operator: &Operator, index: usize, value: &Value) -> Result<bool, ExpressionError> {
    scalar(operator, index, value)?
        .as_bool()
        .ok_or_else(|| {
            operand_error(
                operator,
                index,
                format!("expected a boolean, got {}", value.type_name()),
            )
        })
}

fn number(operator: &Operator, index: usize, value: &Value) -> Result<Number, ExpressionError> {
    Number::from_scalar(scalar(operator, index, value)?)
        .ok_or_else(|| {
            operand_error(
                operator,
                index,
                format!("expected a number, got {}", value.type_name()),
            )
        })
}

fn integer(operator: &Operator, index: usize, value: &Value) -> Result<i64, ExpressionError> {
    scalar(operator, index, value)?
        .as_integer()
        .ok_or_else(|| {
            operand_error(
                operator,
                index,
                format!("expected an integer, got {}", value.type_name()),
            )
        })
}

fn container<'a>(
    operator: &Operator,
    index: usize,
    value: &'a Value,
) -> Result<&'a Container, ExpressionError> {
    value
        .as_container()
        .ok_or_else(|| {
            operand_error(
                operator,
                index,
                format!("expected a container, got {}", value.type_name()),
            )
        })
}

fn any_null(operands: &[Value]) -> bool {
    operands.iter().any(Value::is_null)
}

/// Every scalar of `operands`, containers spliced in left to right.
fn flatten(operands: &[Value]) -> Vec<Scalar> {
    let mut out = Vec::new();
    for operand in operands {
        match operand {
            Value::Scalar(s) => out.push(s.clone()),
            Value::Container(c) => out.extend(c.elements().iter().cloned()),
            Value::Null | Value::Record(_) => {}
        }
    }
    out
}

// ──────────────────────────────────────────────
// Semantics
// ──────────────────────────────────────────────

/// Apply `operator` to operands already accepted by `check_operands`.
pub(crate) fn apply(operator: &Operator, operands: &[Value]) -> Result<Value, ExpressionError> {
    tracing::trace!(
        operator = operator.name(),
        operands = operands.len(),
        "applying operator"
    );

    match operator {
        Operator::Multiple => build_container(ContainerKind::Multiple, operands),
        Operator::Ordered => build_container(ContainerKind::Ordered, operands),

        Operator::ContainerSize => match &operands[0] {
            Value::Container(c) => Ok(Value::integer(c.len() as i64)),
            _ => Ok(Value::integer(0)),
        },

        Operator::IsNull => Ok(Value::boolean(operands[0].is_null())),

        Operator::Index(n) => match &operands[0] {
            Value::Container(c) if *n >= 1 => Ok(c
                .elements()
                .get(*n - 1)
                .cloned()
                .map_or(Value::Null, Value::Scalar)),
            _ => Ok(Value::Null),
        },

        Operator::FieldValue(field) => match &operands[0] {
            Value::Record(r) => Ok(r.get(field).cloned().map_or(Value::Null, Value::Scalar)),
            _ => Ok(Value::Null),
        },

        Operator::Member => {
            let needle = single_then_container(operator, operands)?;
            match needle {
                None => Ok(Value::Null),
                Some((needle, haystack)) => Ok(Value::boolean(haystack.contains(needle))),
            }
        }

        Operator::Delete => {
            let needle = single_then_container(operator, operands)?;
            match needle {
                None => Ok(Value::Null),
                Some((needle, haystack)) => {
                    let kept: Vec<Scalar> = haystack
                        .elements()
                        .iter()
                        .filter(|e| *e != needle)
                        .cloned()
                        .collect();
                    Ok(Value::Container(Container::new(
                        haystack.kind(),
                        haystack.base_type(),
                        kept,
                    )?))
                }
            }
        }

        Operator::Contains => {
            check_same_cardinality(operator, operands)?;
            if any_null(operands) {
                return Ok(Value::Null);
            }
            let outer = container(operator, 0, &operands[0])?;
            let inner = container(operator, 1, &operands[1])?;
            Ok(Value::boolean(container_contains(outer, inner)))
        }

        Operator::Not => match &operands[0] {
            Value::Null => Ok(Value::Null),
            v => Ok(Value::boolean(!boolean(operator, 0, v)?)),
        },

        Operator::And | Operator::Or => {
            if any_null(operands) {
                return Ok(Value::Null);
            }
            let mut values = Vec::with_capacity(operands.len());
            for (index, operand) in operands.iter().enumerate() {
                values.push(boolean(operator, index, operand)?);
            }
            let result = if matches!(operator, Operator::And) {
                values.iter().all(|b| *b)
            } else {
                values.iter().any(|b| *b)
            };
            Ok(Value::boolean(result))
        }

        Operator::Match => {
            check_same_cardinality(operator, operands)?;
            if any_null(operands) {
                return Ok(Value::Null);
            }
            Ok(Value::boolean(operands[0] == operands[1]))
        }

        Operator::StringMatch { case_sensitive } => {
            if any_null(operands) {
                return Ok(Value::Null);
            }
            let left = text(operator, 0, &operands[0])?;
            let right = text(operator, 1, &operands[1])?;
            let matched = if *case_sensitive {
                left == right
            } else {
                left.to_lowercase() == right.to_lowercase()
            };
            Ok(Value::boolean(matched))
        }

        Operator::Equal | Operator::Lt | Operator::Gt | Operator::Lte | Operator::Gte => {
            if any_null(operands) {
                return Ok(Value::Null);
            }
            let left = number(operator, 0, &operands[0])?.as_decimal();
            let right = number(operator, 1, &operands[1])?.as_decimal();
            let result = match operator {
                Operator::Equal => left == right,
                Operator::Lt => left < right,
                Operator::Gt => left > right,
                Operator::Lte => left <= right,
                _ => left >= right,
            };
            Ok(Value::boolean(result))
        }

        Operator::DurationLt | Operator::DurationGte => {
            if any_null(operands) {
                return Ok(Value::Null);
            }
            let left = duration(operator, 0, &operands[0])?;
            let right = duration(operator, 1, &operands[1])?;
            let result = if matches!(operator, Operator::DurationLt) {
                left < right
            } else {
                left >= right
            };
            Ok(Value::boolean(result))
        }

        Operator::Sum | Operator::Product => {
            if any_null(operands) {
                return Ok(Value::Null);
            }
            let mut numbers = Vec::new();
            for (index, scalar) in flatten(operands).iter().enumerate() {
                numbers.push(Number::from_scalar(scalar).ok_or_else(|| {
                    operand_error(
                        operator,
                        index,
                        format!("expected a number, got {}", scalar.base_type()),
                    )
                })?);
            }
            let result = if matches!(operator, Operator::Sum) {
                numeric::sum(&numbers)?
            } else {
                numeric::product(&numbers)?
            };
            Ok(result.into_value())
        }

        Operator::Subtract => {
            if any_null(operands) {
                return Ok(Value::Null);
            }
            let left = number(operator, 0, &operands[0])?;
            let right = number(operator, 1, &operands[1])?;
            Ok(numeric::subtract(left, right)?.into_value())
        }

        Operator::Divide => {
            if any_null(operands) {
                return Ok(Value::Null);
            }
            let left = number(operator, 0, &operands[0])?;
            let right = number(operator, 1, &operands[1])?;
            Ok(numeric::divide(left, right)?.map_or(Value::Null, Value::float))
        }

        Operator::IntegerDivide | Operator::IntegerModulus => {
            if any_null(operands) {
                return Ok(Value::Null);
            }
            let left = integer(operator, 0, &operands[0])?;
            let right = integer(operator, 1, &operands[1])?;
            let result = if matches!(operator, Operator::IntegerDivide) {
                numeric::integer_divide(left, right)?
            } else {
                numeric::integer_modulus(left, right)?
            };
            Ok(result.map_or(Value::Null, Value::integer))
        }

        Operator::Round | Operator::Truncate => match &operands[0] {
            Value::Null => Ok(Value::Null),
            v => {
                let n = number(operator, 0, v)?;
                let result = if matches!(operator, Operator::Round) {
                    numeric::round(n)?
                } else {
                    numeric::truncate(n)?
                };
                Ok(Value::integer(result))
            }
        },
    }
}

/// `multiple` / `ordered`: drop NULLs, splice containers, NULL when
/// nothing is left.
fn build_container(kind: ContainerKind, operands: &[Value]) -> Result<Value, ExpressionError> {
    let elements = flatten(operands);
    let Some(first) = elements.first() else {
        return Ok(Value::Null);
    };
    let base_type = first.base_type();
    Ok(Value::Container(Container::new(kind, base_type, elements)?))
}

/// `member` / `delete` operands: a single value, then a container.
/// `None` when either is NULL.
fn single_then_container<'a>(
    operator: &Operator,
    operands: &'a [Value],
) -> Result<Option<(&'a Scalar, &'a Container)>, ExpressionError> {
    if let Some(c) = operands[0].cardinality() {
        if c != Cardinality::Single {
            return Err(operand_error(
                operator,
                0,
                format!("cardinality {} is not accepted, expected single", c),
            ));
        }
    }
    if let Some(c) = operands[1].cardinality() {
        if c == Cardinality::Single {
            return Err(operand_error(
                operator,
                1,
                "cardinality single is not accepted, expected a container".to_string(),
            ));
        }
    }
    if any_null(operands) {
        return Ok(None);
    }
    let needle = scalar(operator, 0, &operands[0])?;
    let haystack = container(operator, 1, &operands[1])?;
    Ok(Some((needle, haystack)))
}

fn check_same_cardinality(operator: &Operator, operands: &[Value]) -> Result<(), ExpressionError> {
    if let (Some(left), Some(right)) = (operands[0].cardinality(), operands[1].cardinality()) {
        if left != right {
            return Err(operand_error(
                operator,
                1,
                format!("cardinality {} does not match cardinality {}", right, left),
            ));
        }
    }
    Ok(())
}

/// Multiset inclusion for multiple containers, contiguous subsequence for
/// ordered ones.
fn container_contains(outer: &Container, inner: &Container) -> bool {
    let outer = outer.elements();
    let needle = inner.elements();
    match inner.kind() {
        ContainerKind::Ordered => outer.windows(needle.len()).any(|w| w == needle),
        ContainerKind::Multiple => {
            let mut used = vec![false; outer.len()];
            needle.iter().all(|n| {
                match outer
                    .iter()
                    .enumerate()
                    .position(|(i, o)| !used[i] && o == n)
                {
                    Some(i) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
    }
}

fn text<'a>(
    operator: &Operator,
    index: usize,
    value: &'a Value,
) -> Result<&'a str, ExpressionError> {
    scalar(operator, index, value)?
        .as_str()
        .ok_or_else(|| {
            operand_error(
                operator,
                index,
                format!("expected a string, got {}", value.type_name()),
            )
        })
}

fn duration(
    operator: &Operator,
    index: usize,
    value: &Value,
) -> Result<time::Duration, ExpressionError> {
    scalar(operator, index, value)?
        .as_duration()
        .ok_or_else(|| {
            operand_error(
                operator,
                index,
                format!("expected a duration, got {}", value.type_name()),
            )
        })
}

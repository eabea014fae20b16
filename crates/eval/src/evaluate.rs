//! Expression tree evaluator.
//!
//! Leaves read the variable state directly; operator nodes evaluate their
//! operands left to right, then hand the results to `operators` for the
//! contract check and the operator semantics. The first error aborts the
//! whole tree.

use std::collections::BTreeSet;

use rust_decimal::Decimal;

use qti_core::{Expression, Mapping, Value};

use crate::error::ExpressionError;
use crate::operators::{apply, check_operands};
use crate::state::{Variable, VariableState};

/// Evaluate an expression tree against a variable state.
pub fn eval_expr(expr: &Expression, state: &VariableState) -> Result<Value, ExpressionError> {
    match expr {
        Expression::BaseValue(scalar) => Ok(Value::Scalar(scalar.clone())),

        Expression::Variable(id) => Ok(lookup(state, id)?.value().clone()),

        Expression::Correct(id) => {
            let variable = lookup(state, id)?;
            if !variable.is_response() {
                return Err(ExpressionError::WrongVariableKind {
                    expression: "correct",
                    identifier: id.clone(),
                    expected: "response",
                });
            }
            Ok(variable.correct_response().cloned().unwrap_or_default())
        }

        Expression::Default(id) => Ok(lookup(state, id)?.default_value().clone()),

        Expression::MapResponse(id) => {
            let variable = lookup(state, id)?;
            let mapping = variable
                .mapping()
                .ok_or_else(|| ExpressionError::WrongVariableKind {
                    expression: "mapResponse",
                    identifier: id.clone(),
                    expected: "mapped response",
                })?;
            map_response(mapping, variable.value())
        }

        Expression::Null => Ok(Value::Null),

        Expression::Operator { operator, operands } => {
            let values = operands
                .iter()
                .map(|operand| eval_expr(operand, state))
                .collect::<Result<Vec<_>, _>>()?;
            check_operands(operator, &values)?;
            apply(operator, &values)
        }
    }
}

fn lookup<'a>(state: &'a VariableState, id: &str) -> Result<&'a Variable, ExpressionError> {
    state
        .get(id)
        .map_err(|_| ExpressionError::UnknownVariable {
            identifier: id.to_string(),
        })
}

/// Single values map through the table, falling back to the mapping
/// default. Containers sum the entries matched by their elements, each
/// entry counted once, plus the default for every unmatched element.
fn map_response(mapping: &Mapping, value: &Value) -> Result<Value, ExpressionError> {
    let total = match value {
        Value::Null | Value::Record(_) => mapping.default_value,
        Value::Scalar(scalar) => match mapping.find(scalar) {
            Some(i) => mapping.entries[i].mapped_value,
            None => mapping.default_value,
        },
        Value::Container(container) => {
            if container.is_empty() {
                mapping.default_value
            } else {
                let mut seen = BTreeSet::new();
                let mut total = Decimal::ZERO;
                for element in container.elements() {
                    let mapped = match mapping.find(element) {
                        Some(i) if seen.insert(i) => mapping.entries[i].mapped_value,
                        Some(_) => continue,
                        None => mapping.default_value,
                    };
                    total = total
                        .checked_add(mapped)
                        .ok_or(ExpressionError::Overflow {
                            operator: "mapResponse",
                        })?;
                }
                total
            }
        }
    };
    Ok(Value::float(mapping.clamp(total)))
}

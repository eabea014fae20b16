//! Response-processing engine.
//!
//! Runs a rule program in order against a mutable variable state.
//! `exitResponse` unwinds through nested conditions and stops the program
//! without an error; any expression or assignment error aborts it.

use qti_core::{BaseType, ResponseProcessing, ResponseRule, Scalar, Value};

use crate::error::RuleError;
use crate::evaluate::eval_expr;
use crate::state::VariableState;

/// Whether execution continues after a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Execute `processing` against `state`.
pub fn process_response(
    processing: &ResponseProcessing,
    state: &mut VariableState,
) -> Result<(), RuleError> {
    if run_rules(&processing.rules, state)? == Flow::Exit {
        tracing::debug!("response processing exited early");
    }
    Ok(())
}

fn run_rules(rules: &[ResponseRule], state: &mut VariableState) -> Result<Flow, RuleError> {
    for rule in rules {
        if run_rule(rule, state)? == Flow::Exit {
            return Ok(Flow::Exit);
        }
    }
    Ok(Flow::Continue)
}

fn run_rule(rule: &ResponseRule, state: &mut VariableState) -> Result<Flow, RuleError> {
    match rule {
        ResponseRule::SetOutcomeValue {
            identifier,
            expression,
        } => {
            let value = eval_expr(expression, state)?;
            set_outcome_value(state, identifier, value)?;
            Ok(Flow::Continue)
        }

        ResponseRule::ResponseCondition(condition) => {
            for branch in &condition.branches {
                if is_true(&eval_expr(&branch.condition, state)?)? {
                    return run_rules(&branch.rules, state);
                }
            }
            run_rules(&condition.otherwise, state)
        }

        ResponseRule::ExitResponse => Ok(Flow::Exit),
    }
}

/// NULL counts as false.
fn is_true(value: &Value) -> Result<bool, RuleError> {
    match value {
        Value::Null => Ok(false),
        Value::Scalar(Scalar::Boolean(b)) => Ok(*b),
        other => Err(RuleError::NonBooleanCondition {
            got: other.type_name(),
        }),
    }
}

fn set_outcome_value(
    state: &mut VariableState,
    identifier: &str,
    value: Value,
) -> Result<(), RuleError> {
    let variable = state.get(identifier)?;
    if !variable.is_outcome() {
        return Err(RuleError::NotAnOutcome {
            identifier: identifier.to_string(),
        });
    }
    let value = match (variable.base_type(), value) {
        (Some(BaseType::Float), Value::Scalar(Scalar::Integer(i))) => {
            Value::float(rust_decimal::Decimal::from(i))
        }
        (_, value) => value,
    };
    state.set(identifier, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qti_core::{Cardinality, Expression, Operator};
    use rust_decimal::Decimal;

    use crate::error::{ExpressionError, StateError};
    use crate::state::Variable;

    fn state() -> VariableState {
        let mut s = VariableState::new();
        s.insert(Variable::response(
            "RESPONSE",
            Cardinality::Single,
            Some(BaseType::Identifier),
        ));
        s.insert(Variable::outcome("SCORE", Cardinality::Single, Some(BaseType::Float)));
        s.insert(Variable::outcome("FEEDBACK", Cardinality::Single, Some(BaseType::Identifier)));
        s
    }

    fn is_choice_a() -> Expression {
        Expression::operator(
            Operator::Match,
            vec![Expression::variable("RESPONSE"), Expression::identifier("A")],
        )
    }

    fn scoring() -> ResponseProcessing {
        ResponseProcessing::new(vec![ResponseRule::condition(
            is_choice_a(),
            vec![ResponseRule::set_outcome_value("SCORE", Expression::integer(1))],
            vec![ResponseRule::set_outcome_value("SCORE", Expression::integer(0))],
        )])
    }

    #[test]
    fn integer_result_promoted_to_float_outcome() {
        let mut s = state();
        s.set("RESPONSE", Value::identifier("A")).unwrap();
        process_response(&scoring(), &mut s).unwrap();
        assert_eq!(s.value("SCORE").unwrap(), &Value::float(Decimal::ONE));
    }

    #[test]
    fn null_condition_takes_otherwise_branch() {
        let mut s = state();
        process_response(&scoring(), &mut s).unwrap();
        assert_eq!(s.value("SCORE").unwrap(), &Value::float(Decimal::ZERO));
    }

    #[test]
    fn exit_response_stops_nested_program() {
        let program = ResponseProcessing::new(vec![
            ResponseRule::condition(
                Expression::boolean(true),
                vec![ResponseRule::ExitResponse],
                vec![],
            ),
            ResponseRule::set_outcome_value("FEEDBACK", Expression::identifier("late")),
        ]);
        let mut s = state();
        process_response(&program, &mut s).unwrap();
        assert_eq!(s.value("FEEDBACK").unwrap(), &Value::Null);
    }

    #[test]
    fn first_true_branch_wins() {
        let program = ResponseProcessing::new(vec![ResponseRule::ResponseCondition(
            qti_core::ResponseCondition {
                branches: vec![
                    qti_core::ConditionalBranch {
                        condition: Expression::boolean(false),
                        rules: vec![ResponseRule::set_outcome_value(
                            "FEEDBACK",
                            Expression::identifier("first"),
                        )],
                    },
                    qti_core::ConditionalBranch {
                        condition: Expression::boolean(true),
                        rules: vec![ResponseRule::set_outcome_value(
                            "FEEDBACK",
                            Expression::identifier("second"),
                        )],
                    },
                ],
                otherwise: vec![ResponseRule::set_outcome_value(
                    "FEEDBACK",
                    Expression::identifier("otherwise"),
                )],
            },
        )]);
        let mut s = state();
        process_response(&program, &mut s).unwrap();
        assert_eq!(s.value("FEEDBACK").unwrap(), &Value::identifier("second"));
    }

    #[test]
    fn setting_a_response_variable_fails() {
        let program = ResponseProcessing::new(vec![ResponseRule::set_outcome_value(
            "RESPONSE",
            Expression::identifier("B"),
        )]);
        let err = process_response(&program, &mut state()).unwrap_err();
        assert_eq!(
            err,
            RuleError::NotAnOutcome {
                identifier: "RESPONSE".to_string()
            }
        );
    }

    #[test]
    fn incompatible_assignment_fails() {
        let program = ResponseProcessing::new(vec![ResponseRule::set_outcome_value(
            "SCORE",
            Expression::identifier("B"),
        )]);
        let err = process_response(&program, &mut state()).unwrap_err();
        assert!(matches!(err, RuleError::State(StateError::IncompatibleValue { .. })));
    }

    #[test]
    fn non_boolean_condition_fails() {
        let program = ResponseProcessing::new(vec![ResponseRule::condition(
            Expression::integer(1),
            vec![],
            vec![],
        )]);
        let err = process_response(&program, &mut state()).unwrap_err();
        assert_eq!(
            err,
            RuleError::NonBooleanCondition {
                got: "single integer".to_string()
            }
        );
    }

    #[test]
    fn expression_errors_are_wrapped() {
        let program = ResponseProcessing::new(vec![ResponseRule::set_outcome_value(
            "SCORE",
            Expression::variable("MISSING"),
        )]);
        let err = process_response(&program, &mut state()).unwrap_err();
        assert_eq!(
            err,
            RuleError::Expression(ExpressionError::UnknownVariable {
                identifier: "MISSING".to_string()
            })
        );
    }
}

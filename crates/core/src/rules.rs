//! Response-processing rule programs.

use crate::expression::Expression;

/// One rule of a response-processing program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseRule {
    /// Assign the value of an expression to an outcome variable.
    SetOutcomeValue {
        identifier: String,
        expression: Expression,
    },
    ResponseCondition(ResponseCondition),
    /// Stop the program.
    ExitResponse,
}

/// `if` / `else if`* / `else` chain. The first branch whose condition is
/// true runs; `otherwise` runs when none is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCondition {
    pub branches: Vec<ConditionalBranch>,
    pub otherwise: Vec<ResponseRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalBranch {
    pub condition: Expression,
    pub rules: Vec<ResponseRule>,
}

impl ResponseRule {
    pub fn set_outcome_value(identifier: &str, expression: Expression) -> Self {
        ResponseRule::SetOutcomeValue {
            identifier: identifier.to_string(),
            expression,
        }
    }

    /// Single `if` with an optional `else`.
    pub fn condition(
        condition: Expression,
        rules: Vec<ResponseRule>,
        otherwise: Vec<ResponseRule>,
    ) -> Self {
        ResponseRule::ResponseCondition(ResponseCondition {
            branches: vec![ConditionalBranch { condition, rules }],
            otherwise,
        })
    }

    fn collect_expressions<'a>(&'a self, out: &mut Vec<&'a Expression>) {
        match self {
            ResponseRule::SetOutcomeValue { expression, .. } => out.push(expression),
            ResponseRule::ResponseCondition(cond) => {
                for branch in &cond.branches {
                    out.push(&branch.condition);
                    for rule in &branch.rules {
                        rule.collect_expressions(out);
                    }
                }
                for rule in &cond.otherwise {
                    rule.collect_expressions(out);
                }
            }
            ResponseRule::ExitResponse => {}
        }
    }

    fn collect_targets<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ResponseRule::SetOutcomeValue { identifier, .. } => out.push(identifier),
            ResponseRule::ResponseCondition(cond) => {
                let nested = cond
                    .branches
                    .iter()
                    .flat_map(|b| b.rules.iter())
                    .chain(cond.otherwise.iter());
                for rule in nested {
                    rule.collect_targets(out);
                }
            }
            ResponseRule::ExitResponse => {}
        }
    }
}

/// A response-processing program: rules run in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseProcessing {
    pub rules: Vec<ResponseRule>,
}

impl ResponseProcessing {
    pub fn new(rules: Vec<ResponseRule>) -> Self {
        ResponseProcessing { rules }
    }

    /// An empty program is never executed.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every expression of the program, depth first.
    pub fn expressions(&self) -> Vec<&Expression> {
        let mut out = Vec::new();
        for rule in &self.rules {
            rule.collect_expressions(&mut out);
        }
        out
    }

    /// Identifiers assigned by `setOutcomeValue` rules.
    pub fn assigned_variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for rule in &self.rules {
            rule.collect_targets(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Operator;

    #[test]
    fn expressions_and_targets_cover_nested_rules() {
        let program = ResponseProcessing::new(vec![ResponseRule::condition(
            Expression::operator(
                Operator::Match,
                vec![
                    Expression::variable("RESPONSE"),
                    Expression::Correct("RESPONSE".to_string()),
                ],
            ),
            vec![ResponseRule::set_outcome_value("SCORE", Expression::integer(1))],
            vec![
                ResponseRule::set_outcome_value("SCORE", Expression::integer(0)),
                ResponseRule::ExitResponse,
            ],
        )]);
        assert_eq!(program.expressions().len(), 3);
        assert_eq!(program.assigned_variables(), vec!["SCORE", "SCORE"]);
        assert!(!program.is_empty());
        assert!(ResponseProcessing::default().is_empty());
    }
}

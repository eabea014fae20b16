//! Operator contracts exercised through `eval_expr`, plus property tests for
//! the container constructors.

use proptest::collection::vec;
use proptest::prelude::*;
use qti_core::{
    BaseType, Cardinality, Container, ContainerKind, Expression, Operator, Record, Scalar, Value,
};
use qti_eval::{eval_expr, ExpressionError, Variable, VariableState};
use rust_decimal::Decimal;

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

/// A state holding one variable per fixture value, so that container and
/// record operands can be fed to operators through `variable` leaves.
fn state_with(values: &[(&str, Value)]) -> VariableState {
    let mut state = VariableState::new();
    for (identifier, value) in values {
        let cardinality = value.cardinality().unwrap_or(Cardinality::Single);
        state.insert(Variable::outcome(identifier, cardinality, value.base_type()));
        state.set(identifier, value.clone()).unwrap();
    }
    state
}

fn ints(kind: ContainerKind, values: &[i64]) -> Value {
    Value::Container(
        Container::new(
            kind,
            BaseType::Integer,
            values.iter().map(|i| Scalar::Integer(*i)).collect(),
        )
        .unwrap(),
    )
}

fn empty(kind: ContainerKind) -> Value {
    Value::Container(Container::empty(kind, BaseType::Integer))
}

fn op(operator: Operator, operands: Vec<Expression>) -> Expression {
    Expression::operator(operator, operands)
}

fn var(identifier: &str) -> Expression {
    Expression::variable(identifier)
}

fn eval(expr: &Expression, state: &VariableState) -> Result<Value, ExpressionError> {
    eval_expr(expr, state)
}

// ──────────────────────────────────────────────
// multiple / ordered
// ──────────────────────────────────────────────

#[test]
fn multiple_of_nothing_is_null() {
    let state = VariableState::new();
    assert_eq!(eval(&op(Operator::Multiple, vec![]), &state).unwrap(), Value::Null);
    assert_eq!(
        eval(
            &op(Operator::Multiple, vec![Expression::Null, Expression::Null]),
            &state
        )
        .unwrap(),
        Value::Null
    );
}

#[test]
fn multiple_flattens_left_to_right() {
    let state = state_with(&[("C", ints(ContainerKind::Multiple, &[3, 4]))]);
    let expr = op(
        Operator::Multiple,
        vec![Expression::integer(1), Expression::integer(2), var("C")],
    );
    let result = eval(&expr, &state).unwrap();
    let container = result.as_container().unwrap();
    assert_eq!(container.cardinality(), Cardinality::Multiple);
    assert_eq!(
        container.elements(),
        &[
            Scalar::Integer(1),
            Scalar::Integer(2),
            Scalar::Integer(3),
            Scalar::Integer(4)
        ]
    );
}

#[test]
fn ordered_of_null_is_null() {
    let state = VariableState::new();
    assert_eq!(
        eval(&op(Operator::Ordered, vec![Expression::Null]), &state).unwrap(),
        Value::Null
    );
}

#[test]
fn ordered_drops_null_and_empty_operands() {
    let state = state_with(&[("E", empty(ContainerKind::Ordered))]);
    let expr = op(
        Operator::Ordered,
        vec![Expression::Null, Expression::integer(25), var("E")],
    );
    assert_eq!(eval(&expr, &state).unwrap(), ints(ContainerKind::Ordered, &[25]));
}

#[test]
fn ordered_splices_ordered_operands() {
    let state = state_with(&[
        ("E", empty(ContainerKind::Ordered)),
        ("L", ints(ContainerKind::Ordered, &[26])),
    ]);
    let expr = op(
        Operator::Ordered,
        vec![var("E"), Expression::integer(25), var("L")],
    );
    assert_eq!(
        eval(&expr, &state).unwrap(),
        ints(ContainerKind::Ordered, &[25, 26])
    );
}

#[test]
fn ordered_rejects_mixed_base_types() {
    let state = VariableState::new();
    let expr = op(
        Operator::Ordered,
        vec![
            Expression::integer(1),
            Expression::BaseValue(Scalar::Float(Decimal::ONE)),
        ],
    );
    let err = eval(&expr, &state).unwrap_err();
    assert!(matches!(
        err,
        ExpressionError::OperandType { operator: "ordered", index: 1, .. }
    ));
}

#[test]
fn ordered_rejects_records() {
    let record = Record::new().with_field("a", Scalar::Integer(1)).unwrap();
    let state = state_with(&[("R", Value::Record(record))]);
    let err = eval(&op(Operator::Ordered, vec![var("R")]), &state).unwrap_err();
    assert!(matches!(
        err,
        ExpressionError::OperandType { operator: "ordered", index: 0, .. }
    ));
}

#[test]
fn ordered_rejects_multiple_operands() {
    let state = state_with(&[("M", ints(ContainerKind::Multiple, &[1]))]);
    let err = eval(&op(Operator::Ordered, vec![var("M")]), &state).unwrap_err();
    assert!(matches!(err, ExpressionError::OperandType { index: 0, .. }));
}

// ──────────────────────────────────────────────
// Contracts of the other operators
// ──────────────────────────────────────────────

#[test]
fn operand_count_violation_names_operator() {
    let state = VariableState::new();
    let err = eval(
        &op(Operator::Subtract, vec![Expression::integer(1)]),
        &state,
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "operator 'subtract' expects exactly 2 operand(s), got 1"
    );
}

#[test]
fn wrong_cardinality_and_base_type_fail() {
    let state = state_with(&[("M", ints(ContainerKind::Multiple, &[1, 2]))]);
    let cases = vec![
        op(Operator::Not, vec![Expression::integer(1)]),
        op(Operator::Not, vec![var("M")]),
        op(Operator::Lt, vec![Expression::identifier("a"), Expression::integer(1)]),
        op(Operator::Subtract, vec![var("M"), Expression::integer(1)]),
        op(
            Operator::IntegerDivide,
            vec![
                Expression::BaseValue(Scalar::Float(Decimal::ONE)),
                Expression::integer(1),
            ],
        ),
        op(Operator::Index(1), vec![var("M")]),
        op(Operator::ContainerSize, vec![Expression::integer(1)]),
        op(
            Operator::StringMatch { case_sensitive: true },
            vec![Expression::identifier("a"), Expression::identifier("a")],
        ),
    ];
    for expr in cases {
        let result = eval(&expr, &state);
        assert!(
            matches!(result, Err(ExpressionError::OperandType { .. })),
            "{:?} should fail with an operand type error, got {:?}",
            expr,
            result
        );
    }
}

#[test]
fn null_propagates_through_arithmetic() {
    let state = VariableState::new();
    for operator in [
        Operator::Sum,
        Operator::Product,
        Operator::Subtract,
        Operator::Divide,
        Operator::IntegerDivide,
        Operator::IntegerModulus,
        Operator::Lt,
        Operator::Equal,
    ] {
        let expr = op(operator.clone(), vec![Expression::integer(2), Expression::Null]);
        assert_eq!(eval(&expr, &state).unwrap(), Value::Null, "{}", operator.name());
    }
}

#[test]
fn nested_scoring_expression() {
    let state = state_with(&[("SCORE", Value::float(Decimal::new(25, 1)))]);
    // round(SCORE * 2) - 1 >= 4
    let expr = op(
        Operator::Gte,
        vec![
            op(
                Operator::Subtract,
                vec![
                    op(
                        Operator::Round,
                        vec![op(Operator::Product, vec![var("SCORE"), Expression::integer(2)])],
                    ),
                    Expression::integer(1),
                ],
            ),
            Expression::integer(4),
        ],
    );
    assert_eq!(eval(&expr, &state).unwrap(), Value::boolean(true));
}

#[test]
fn field_value_reads_record() {
    let record = Record::new()
        .with_field("count", Scalar::Integer(3))
        .unwrap();
    let state = state_with(&[("R", Value::Record(record))]);
    assert_eq!(
        eval(&op(Operator::FieldValue("count".to_string()), vec![var("R")]), &state).unwrap(),
        Value::integer(3)
    );
    assert_eq!(
        eval(&op(Operator::FieldValue("other".to_string()), vec![var("R")]), &state).unwrap(),
        Value::Null
    );
}

#[test]
fn match_compares_pairs_unordered() {
    let state = VariableState::new();
    let expr = op(
        Operator::Match,
        vec![
            Expression::BaseValue(Scalar::pair("A", "B")),
            Expression::BaseValue(Scalar::pair("B", "A")),
        ],
    );
    assert_eq!(eval(&expr, &state).unwrap(), Value::boolean(true));
}

#[test]
fn is_null_sees_empty_containers() {
    let state = state_with(&[("E", empty(ContainerKind::Multiple))]);
    assert_eq!(
        eval(&op(Operator::IsNull, vec![var("E")]), &state).unwrap(),
        Value::boolean(true)
    );
    assert_eq!(
        eval(&op(Operator::IsNull, vec![Expression::integer(0)]), &state).unwrap(),
        Value::boolean(false)
    );
}

#[test]
fn integer_overflow_is_an_error() {
    let state = VariableState::new();
    let expr = op(
        Operator::Sum,
        vec![Expression::integer(i64::MAX), Expression::integer(1)],
    );
    assert_eq!(
        eval(&expr, &state).unwrap_err(),
        ExpressionError::Overflow { operator: "sum" }
    );
}

// ──────────────────────────────────────────────
// Properties
// ──────────────────────────────────────────────

fn literals(values: &[Option<i64>]) -> Vec<Expression> {
    values
        .iter()
        .map(|v| match v {
            Some(i) => Expression::integer(*i),
            None => Expression::Null,
        })
        .collect()
}

proptest! {
    /// `ordered` keeps every non-null operand, in operand order.
    #[test]
    fn ordered_preserves_operand_order(values in vec(proptest::option::of(-1000i64..1000), 0..20)) {
        let state = VariableState::new();
        let result = eval(&op(Operator::Ordered, literals(&values)), &state).unwrap();
        let expected: Vec<Scalar> = values.iter().flatten().map(|i| Scalar::Integer(*i)).collect();
        if expected.is_empty() {
            prop_assert_eq!(result, Value::Null);
        } else {
            let container = result.as_container().unwrap();
            prop_assert_eq!(container.cardinality(), Cardinality::Ordered);
            prop_assert_eq!(container.elements(), expected.as_slice());
        }
    }

    /// `multiple` over a permutation of the same operands yields an equal
    /// container.
    #[test]
    fn multiple_ignores_operand_order(values in vec(-50i64..50, 1..15)) {
        let state = VariableState::new();
        let mut reversed = values.clone();
        reversed.reverse();
        let forward: Vec<Expression> = values.iter().map(|i| Expression::integer(*i)).collect();
        let backward: Vec<Expression> = reversed.iter().map(|i| Expression::integer(*i)).collect();
        let a = eval(&op(Operator::Multiple, forward), &state).unwrap();
        let b = eval(&op(Operator::Multiple, backward), &state).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Splicing containers equals listing their elements directly.
    #[test]
    fn splicing_matches_flat_listing(
        left in vec(-100i64..100, 0..8),
        right in vec(-100i64..100, 0..8),
    ) {
        let state = state_with(&[
            ("L", ints(ContainerKind::Ordered, &left)),
            ("R", ints(ContainerKind::Ordered, &right)),
        ]);
        let spliced = eval(&op(Operator::Ordered, vec![var("L"), var("R")]), &state).unwrap();
        let flat: Vec<Expression> = left
            .iter()
            .chain(right.iter())
            .map(|i| Expression::integer(*i))
            .collect();
        let listed = eval(&op(Operator::Ordered, flat), &state).unwrap();
        prop_assert_eq!(spliced, listed);
    }

    /// `containerSize` of `multiple(...)` counts the non-null operands.
    #[test]
    fn container_size_counts_elements(values in vec(proptest::option::of(0i64..10), 0..20)) {
        let state = VariableState::new();
        let expr = op(Operator::ContainerSize, vec![op(Operator::Multiple, literals(&values))]);
        let expected = values.iter().flatten().count() as i64;
        prop_assert_eq!(eval(&expr, &state).unwrap(), Value::integer(expected));
    }
}

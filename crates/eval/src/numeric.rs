//! Numeric model over `rust_decimal`.
//!
//! Integer operands stay `i64` and use checked arithmetic; as soon as a
//! float takes part the computation moves to `Decimal`. No `f64` anywhere
//! in the evaluation path.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use qti_core::{Scalar, Value};

use crate::error::ExpressionError;

/// A numeric operand: integer or float.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Number {
    Integer(i64),
    Float(Decimal),
}

impl Number {
    pub fn from_scalar(scalar: &Scalar) -> Option<Number> {
        match scalar {
            Scalar::Integer(i) => Some(Number::Integer(*i)),
            Scalar::Float(d) => Some(Number::Float(*d)),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Decimal {
        match self {
            Number::Integer(i) => Decimal::from(*i),
            Number::Float(d) => *d,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Integer(i) => Value::integer(i),
            Number::Float(d) => Value::float(d),
        }
    }
}

fn overflow(operator: &'static str) -> ExpressionError {
    ExpressionError::Overflow { operator }
}

/// Fold `numbers` with an integer and a decimal combinator. The result is
/// an integer only when every operand is.
fn fold(
    operator: &'static str,
    numbers: &[Number],
    identity: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    dec_op: fn(Decimal, Decimal) -> Option<Decimal>,
) -> Result<Number, ExpressionError> {
    numbers.iter().try_fold(identity, |acc, n| match (acc, n) {
        (Number::Integer(a), Number::Integer(b)) => int_op(a, *b)
            .map(Number::Integer)
            .ok_or_else(|| overflow(operator)),
        (a, b) => dec_op(a.as_decimal(), b.as_decimal())
            .map(Number::Float)
            .ok_or_else(|| overflow(operator)),
    })
}

pub fn sum(numbers: &[Number]) -> Result<Number, ExpressionError> {
    fold(
        "sum",
        numbers,
        Number::Integer(0),
        i64::checked_add,
        Decimal::checked_add,
    )
}

pub fn product(numbers: &[Number]) -> Result<Number, ExpressionError> {
    fold(
        "product",
        numbers,
        Number::Integer(1),
        i64::checked_mul,
        Decimal::checked_mul,
    )
}

pub fn subtract(left: Number, right: Number) -> Result<Number, ExpressionError> {
    match (left, right) {
        (Number::Integer(a), Number::Integer(b)) => a
            .checked_sub(b)
            .map(Number::Integer)
            .ok_or_else(|| overflow("subtract")),
        (a, b) => a
            .as_decimal()
            .checked_sub(b.as_decimal())
            .map(Number::Float)
            .ok_or_else(|| overflow("subtract")),
    }
}

/// Always a float. `None` when dividing by zero.
pub fn divide(left: Number, right: Number) -> Result<Option<Decimal>, ExpressionError> {
    let divisor = right.as_decimal();
    if divisor.is_zero() {
        return Ok(None);
    }
    left.as_decimal()
        .checked_div(divisor)
        .map(Some)
        .ok_or_else(|| overflow("divide"))
}

/// Floor division. `None` when dividing by zero.
pub fn integer_divide(left: i64, right: i64) -> Result<Option<i64>, ExpressionError> {
    if right == 0 {
        return Ok(None);
    }
    let quotient = left
        .checked_div(right)
        .ok_or_else(|| overflow("integerDivide"))?;
    if left % right != 0 && ((left < 0) != (right < 0)) {
        return Ok(Some(quotient - 1));
    }
    Ok(Some(quotient))
}

/// Remainder with the sign of the dividend. `None` when dividing by zero.
pub fn integer_modulus(left: i64, right: i64) -> Result<Option<i64>, ExpressionError> {
    if right == 0 {
        return Ok(None);
    }
    left.checked_rem(right)
        .map(Some)
        .ok_or_else(|| overflow("integerModulus"))
}

/// Round half up: `floor(x + 0.5)`.
pub fn round(n: Number) -> Result<i64, ExpressionError> {
    match n {
        Number::Integer(i) => Ok(i),
        Number::Float(d) => d
            .checked_add(Decimal::new(5, 1))
            .map(|d| d.floor())
            .and_then(|d| d.to_i64())
            .ok_or_else(|| overflow("round")),
    }
}

/// Drop the fractional part, toward zero.
pub fn truncate(n: Number) -> Result<i64, ExpressionError> {
    match n {
        Number::Integer(i) => Ok(i),
        Number::Float(d) => d.trunc().to_i64().ok_or_else(|| overflow("truncate")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn integer_sum_stays_integer() {
        let n = sum(&[Number::Integer(2), Number::Integer(3)]).unwrap();
        assert_eq!(n, Number::Integer(5));
    }

    #[test]
    fn mixed_sum_is_float() {
        let n = sum(&[Number::Integer(2), Number::Float(dec("0.5"))]).unwrap();
        assert_eq!(n, Number::Float(dec("2.5")));
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let err = sum(&[Number::Integer(i64::MAX), Number::Integer(1)]).unwrap_err();
        assert_eq!(err, ExpressionError::Overflow { operator: "sum" });
        assert!(product(&[Number::Integer(i64::MAX), Number::Integer(2)]).is_err());
        assert!(subtract(Number::Integer(i64::MIN), Number::Integer(1)).is_err());
    }

    #[test]
    fn divide_by_zero_is_none() {
        assert_eq!(divide(Number::Integer(1), Number::Integer(0)).unwrap(), None);
        assert_eq!(
            divide(Number::Integer(1), Number::Integer(4)).unwrap(),
            Some(dec("0.25"))
        );
    }

    #[test]
    fn integer_division_floors() {
        assert_eq!(integer_divide(7, 2).unwrap(), Some(3));
        assert_eq!(integer_divide(-7, 2).unwrap(), Some(-4));
        assert_eq!(integer_divide(7, -2).unwrap(), Some(-4));
        assert_eq!(integer_divide(-8, 2).unwrap(), Some(-4));
        assert_eq!(integer_divide(1, 0).unwrap(), None);
        assert!(integer_divide(i64::MIN, -1).is_err());
    }

    #[test]
    fn modulus_follows_dividend_sign() {
        assert_eq!(integer_modulus(7, 3).unwrap(), Some(1));
        assert_eq!(integer_modulus(-7, 3).unwrap(), Some(-1));
        assert_eq!(integer_modulus(7, 0).unwrap(), None);
    }

    #[test]
    fn round_half_up() {
        assert_eq!(round(Number::Float(dec("2.5"))).unwrap(), 3);
        assert_eq!(round(Number::Float(dec("-2.5"))).unwrap(), -2);
        assert_eq!(round(Number::Float(dec("-2.6"))).unwrap(), -3);
        assert_eq!(round(Number::Integer(4)).unwrap(), 4);
    }

    #[test]
    fn truncate_toward_zero() {
        assert_eq!(truncate(Number::Float(dec("2.9"))).unwrap(), 2);
        assert_eq!(truncate(Number::Float(dec("-2.9"))).unwrap(), -2);
    }
}

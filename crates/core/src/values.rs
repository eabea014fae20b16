//! Runtime value model.
//!
//! A `Value` is NULL, a single scalar, a multiple/ordered container of
//! scalars sharing one base type, or a record of keyed scalars. Containers
//! never nest: container elements are `Scalar`s by construction.
//!
//! Float payloads use `rust_decimal::Decimal`, never `f64`, so values keep
//! structural `Eq` and comparisons stay exact.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::error::ValueError;

// ──────────────────────────────────────────────
// Type tags
// ──────────────────────────────────────────────

/// Scalar payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseType {
    Identifier,
    Boolean,
    Integer,
    Float,
    String,
    Point,
    Pair,
    DirectedPair,
    Duration,
    Uri,
}

impl BaseType {
    pub fn name(&self) -> &'static str {
        match self {
            BaseType::Identifier => "identifier",
            BaseType::Boolean => "boolean",
            BaseType::Integer => "integer",
            BaseType::Float => "float",
            BaseType::String => "string",
            BaseType::Point => "point",
            BaseType::Pair => "pair",
            BaseType::DirectedPair => "directedPair",
            BaseType::Duration => "duration",
            BaseType::Uri => "uri",
        }
    }

    /// True for integer and float.
    pub fn is_numeric(&self) -> bool {
        matches!(self, BaseType::Integer | BaseType::Float)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    Single,
    Multiple,
    Ordered,
    Record,
}

impl Cardinality {
    pub fn name(&self) -> &'static str {
        match self {
            Cardinality::Single => "single",
            Cardinality::Multiple => "multiple",
            Cardinality::Ordered => "ordered",
            Cardinality::Record => "record",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ──────────────────────────────────────────────
// Compound scalar payloads
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// Unordered pair of identifiers: `A B` equals `B A`.
#[derive(Debug, Clone, Eq)]
pub struct Pair {
    pub first: String,
    pub second: String,
}

impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        (self.first == other.first && self.second == other.second)
            || (self.first == other.second && self.second == other.first)
    }
}

/// Ordered pair of identifiers: `A B` differs from `B A`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectedPair {
    pub source: String,
    pub destination: String,
}

// ──────────────────────────────────────────────
// Scalars
// ──────────────────────────────────────────────

/// A single, non-NULL payload tagged with its base type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Identifier(String),
    Boolean(bool),
    Integer(i64),
    Float(Decimal),
    String(String),
    Point(Point),
    Pair(Pair),
    DirectedPair(DirectedPair),
    Duration(Duration),
    Uri(String),
}

impl Scalar {
    pub fn base_type(&self) -> BaseType {
        match self {
            Scalar::Identifier(_) => BaseType::Identifier,
            Scalar::Boolean(_) => BaseType::Boolean,
            Scalar::Integer(_) => BaseType::Integer,
            Scalar::Float(_) => BaseType::Float,
            Scalar::String(_) => BaseType::String,
            Scalar::Point(_) => BaseType::Point,
            Scalar::Pair(_) => BaseType::Pair,
            Scalar::DirectedPair(_) => BaseType::DirectedPair,
            Scalar::Duration(_) => BaseType::Duration,
            Scalar::Uri(_) => BaseType::Uri,
        }
    }

    pub fn pair(first: &str, second: &str) -> Self {
        Scalar::Pair(Pair {
            first: first.to_string(),
            second: second.to_string(),
        })
    }

    pub fn directed_pair(source: &str, destination: &str) -> Self {
        Scalar::DirectedPair(DirectedPair {
            source: source.to_string(),
            destination: destination.to_string(),
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the scalar; integers are promoted.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Scalar::Integer(i) => Some(Decimal::from(*i)),
            Scalar::Float(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Scalar::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// Text payload of identifier, string and uri scalars.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Identifier(s) | Scalar::String(s) | Scalar::Uri(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Identifier(s) | Scalar::String(s) | Scalar::Uri(s) => {
                serde_json::Value::String(s.clone())
            }
            Scalar::Boolean(b) => serde_json::Value::Bool(*b),
            Scalar::Integer(i) => serde_json::json!(i),
            Scalar::Float(d) => serde_json::Value::String(d.to_string()),
            Scalar::Point(p) => serde_json::json!([p.x, p.y]),
            Scalar::Pair(p) => serde_json::json!([p.first, p.second]),
            Scalar::DirectedPair(p) => serde_json::json!([p.source, p.destination]),
            Scalar::Duration(_) => serde_json::Value::String(self.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Identifier(s) | Scalar::String(s) | Scalar::Uri(s) => f.write_str(s),
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(d) => write!(f, "{}", d),
            Scalar::Point(p) => write!(f, "{} {}", p.x, p.y),
            Scalar::Pair(p) => write!(f, "{} {}", p.first, p.second),
            Scalar::DirectedPair(p) => write!(f, "{} {}", p.source, p.destination),
            Scalar::Duration(d) => {
                let millis = d.subsec_milliseconds();
                if millis == 0 {
                    write!(f, "PT{}S", d.whole_seconds())
                } else {
                    write!(f, "PT{}.{:03}S", d.whole_seconds(), millis.abs())
                }
            }
        }
    }
}

// ──────────────────────────────────────────────
// Containers
// ──────────────────────────────────────────────

/// Whether a container keeps element order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Multiple,
    Ordered,
}

impl ContainerKind {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            ContainerKind::Multiple => Cardinality::Multiple,
            ContainerKind::Ordered => Cardinality::Ordered,
        }
    }
}

/// A multiple or ordered collection of scalars of one base type.
///
/// An empty container still carries its base type; it is NULL-like
/// (`is_null`) but not equal to `Value::Null`.
#[derive(Debug, Clone)]
pub struct Container {
    kind: ContainerKind,
    base_type: BaseType,
    elements: Vec<Scalar>,
}

impl Container {
    pub fn new(
        kind: ContainerKind,
        base_type: BaseType,
        elements: Vec<Scalar>,
    ) -> Result<Self, ValueError> {
        for element in &elements {
            check_element(kind, base_type, element)?;
        }
        Ok(Container {
            kind,
            base_type,
            elements,
        })
    }

    pub fn empty(kind: ContainerKind, base_type: BaseType) -> Self {
        Container {
            kind,
            base_type,
            elements: Vec::new(),
        }
    }

    pub fn multiple(base_type: BaseType, elements: Vec<Scalar>) -> Result<Self, ValueError> {
        Container::new(ContainerKind::Multiple, base_type, elements)
    }

    pub fn ordered(base_type: BaseType, elements: Vec<Scalar>) -> Result<Self, ValueError> {
        Container::new(ContainerKind::Ordered, base_type, elements)
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.kind.cardinality()
    }

    pub fn base_type(&self) -> BaseType {
        self.base_type
    }

    pub fn elements(&self) -> &[Scalar] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, scalar: &Scalar) -> bool {
        self.elements.contains(scalar)
    }

    pub fn push(&mut self, element: Scalar) -> Result<(), ValueError> {
        check_element(self.kind, self.base_type, &element)?;
        self.elements.push(element);
        Ok(())
    }

    pub fn into_elements(self) -> Vec<Scalar> {
        self.elements
    }
}

fn check_element(
    kind: ContainerKind,
    base_type: BaseType,
    element: &Scalar,
) -> Result<(), ValueError> {
    if element.base_type() != base_type {
        return Err(ValueError::BaseTypeMismatch {
            container: kind.cardinality(),
            expected: base_type,
            actual: element.base_type(),
        });
    }
    Ok(())
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind
            || self.base_type != other.base_type
            || self.elements.len() != other.elements.len()
        {
            return false;
        }
        match self.kind {
            ContainerKind::Ordered => self.elements == other.elements,
            ContainerKind::Multiple => same_multiset(&self.elements, &other.elements),
        }
    }
}

impl Eq for Container {}

/// Multiset equality without requiring `Hash`/`Ord` on scalars
/// (pairs compare unordered).
fn same_multiset(left: &[Scalar], right: &[Scalar]) -> bool {
    let mut used = vec![false; right.len()];
    left.iter().all(|l| {
        match right
            .iter()
            .enumerate()
            .position(|(i, r)| !used[i] && r == l)
        {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// Keyed collection of heterogeneous scalars.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, Scalar>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn insert(&mut self, key: &str, value: Scalar) -> Result<Option<Scalar>, ValueError> {
        if key.is_empty() {
            return Err(ValueError::EmptyRecordKey);
        }
        Ok(self.fields.insert(key.to_string(), value))
    }

    pub fn with_field(mut self, key: &str, value: Scalar) -> Result<Self, ValueError> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.fields.iter()
    }
}

// ──────────────────────────────────────────────
// Values
// ──────────────────────────────────────────────

/// A typed runtime value, or NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Value {
    #[default]
    Null,
    Scalar(Scalar),
    Container(Container),
    Record(Record),
}

impl Value {
    pub fn identifier(s: &str) -> Self {
        Value::Scalar(Scalar::Identifier(s.to_string()))
    }

    pub fn string(s: &str) -> Self {
        Value::Scalar(Scalar::String(s.to_string()))
    }

    pub fn integer(i: i64) -> Self {
        Value::Scalar(Scalar::Integer(i))
    }

    pub fn float(d: Decimal) -> Self {
        Value::Scalar(Scalar::Float(d))
    }

    pub fn boolean(b: bool) -> Self {
        Value::Scalar(Scalar::Boolean(b))
    }

    pub fn duration(d: Duration) -> Self {
        Value::Scalar(Scalar::Duration(d))
    }

    pub fn point(x: i64, y: i64) -> Self {
        Value::Scalar(Scalar::Point(Point { x, y }))
    }

    /// NULL, or a container/record with no elements.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Scalar(_) => false,
            Value::Container(c) => c.is_empty(),
            Value::Record(r) => r.is_empty(),
        }
    }

    /// `None` for NULL.
    pub fn cardinality(&self) -> Option<Cardinality> {
        match self {
            Value::Null => None,
            Value::Scalar(_) => Some(Cardinality::Single),
            Value::Container(c) => Some(c.cardinality()),
            Value::Record(_) => Some(Cardinality::Record),
        }
    }

    /// `None` for NULL and records.
    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Value::Null | Value::Record(_) => None,
            Value::Scalar(s) => Some(s.base_type()),
            Value::Container(c) => Some(c.base_type()),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(c) => Some(c),
            _ => None,
        }
    }

    /// Whether this value may be stored in a variable declared with the
    /// given cardinality and base type. NULL is always accepted.
    pub fn conforms_to(&self, cardinality: Cardinality, base_type: Option<BaseType>) -> bool {
        match self {
            Value::Null => true,
            Value::Record(_) => cardinality == Cardinality::Record,
            _ => self.cardinality() == Some(cardinality) && self.base_type() == base_type,
        }
    }

    /// Human-readable type description for error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Record(_) => "record".to_string(),
            Value::Scalar(s) => format!("single {}", s.base_type()),
            Value::Container(c) => format!("{} {}", c.cardinality(), c.base_type()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Scalar(s) => s.to_json(),
            Value::Container(c) => {
                serde_json::Value::Array(c.elements().iter().map(Scalar::to_json).collect())
            }
            Value::Record(r) => serde_json::Value::Object(
                r.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<Container> for Value {
    fn from(c: Container) -> Self {
        Value::Container(c)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

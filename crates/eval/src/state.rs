//! Variables and the ordered variable state of a session.
//!
//! `VariableState` maps identifiers to `Variable` slots in insertion order.
//! Assigning a value replaces the current value of the existing slot; it
//! never builds a new `Variable`, so the slot's identity, declaration and
//! position are stable for the life of the state. Cloning a state deep
//! copies every variable.

use std::collections::BTreeMap;

use qti_core::{
    BaseType, Cardinality, LookupTable, Mapping, OutcomeDeclaration, ResponseDeclaration, Scalar,
    Value,
};
use rust_decimal::Decimal;

use crate::error::StateError;

// ──────────────────────────────────────────────
// Variables
// ──────────────────────────────────────────────

/// What distinguishes response variables from outcome variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableKind {
    Response {
        correct_response: Option<Value>,
        mapping: Option<Mapping>,
    },
    Outcome {
        normal_minimum: Option<Decimal>,
        normal_maximum: Option<Decimal>,
        mastery_value: Option<Decimal>,
        lookup_table: Option<LookupTable>,
    },
}

/// A declared variable and its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    identifier: String,
    cardinality: Cardinality,
    base_type: Option<BaseType>,
    value: Value,
    default_value: Value,
    kind: VariableKind,
    built_in: bool,
}

impl Variable {
    /// A response variable with no default, correct response or mapping.
    pub fn response(
        identifier: &str,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Self {
        Variable {
            identifier: identifier.to_string(),
            cardinality,
            base_type,
            value: Value::Null,
            default_value: Value::Null,
            kind: VariableKind::Response {
                correct_response: None,
                mapping: None,
            },
            built_in: false,
        }
    }

    /// An outcome variable with no default, bounds or lookup table.
    pub fn outcome(
        identifier: &str,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Self {
        Variable {
            identifier: identifier.to_string(),
            cardinality,
            base_type,
            value: Value::Null,
            default_value: Value::Null,
            kind: VariableKind::Outcome {
                normal_minimum: None,
                normal_maximum: None,
                mastery_value: None,
                lookup_table: None,
            },
            built_in: false,
        }
    }

    /// Response variables start NULL whatever their default.
    pub fn from_response_declaration(decl: &ResponseDeclaration) -> Self {
        Variable {
            default_value: decl.default_value.clone().unwrap_or_default(),
            kind: VariableKind::Response {
                correct_response: decl.correct_response.clone(),
                mapping: decl.mapping.clone(),
            },
            ..Variable::response(&decl.identifier, decl.cardinality, decl.base_type)
        }
    }

    /// Outcome variables start NULL; callers apply the default.
    pub fn from_outcome_declaration(decl: &OutcomeDeclaration) -> Self {
        Variable {
            default_value: decl.default_value.clone().unwrap_or_default(),
            kind: VariableKind::Outcome {
                normal_minimum: decl.normal_minimum,
                normal_maximum: decl.normal_maximum,
                mastery_value: decl.mastery_value,
                lookup_table: decl.lookup_table.clone(),
            },
            ..Variable::outcome(&decl.identifier, decl.cardinality, decl.base_type)
        }
    }

    /// Mark as built-in, starting at (and defaulting to) `value`.
    pub(crate) fn built_in(mut self, value: Value) -> Self {
        self.default_value = value.clone();
        self.value = value;
        self.built_in = true;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn base_type(&self) -> Option<BaseType> {
        self.base_type
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    /// `numAttempts`, `duration` and `completionStatus`.
    pub fn is_built_in(&self) -> bool {
        self.built_in
    }

    pub fn is_response(&self) -> bool {
        matches!(self.kind, VariableKind::Response { .. })
    }

    pub fn is_outcome(&self) -> bool {
        matches!(self.kind, VariableKind::Outcome { .. })
    }

    pub fn correct_response(&self) -> Option<&Value> {
        match &self.kind {
            VariableKind::Response {
                correct_response, ..
            } => correct_response.as_ref(),
            VariableKind::Outcome { .. } => None,
        }
    }

    pub fn mapping(&self) -> Option<&Mapping> {
        match &self.kind {
            VariableKind::Response { mapping, .. } => mapping.as_ref(),
            VariableKind::Outcome { .. } => None,
        }
    }

    /// True iff a correct response is declared and the current value
    /// equals it.
    pub fn is_correct(&self) -> bool {
        self.correct_response()
            .is_some_and(|correct| *correct == self.value)
    }

    /// Reset the current value to the default. An outcome variable with no
    /// declared default that is a single integer or float becomes zero.
    pub fn apply_default_value(&mut self) {
        self.value = match (&self.default_value, &self.kind) {
            (Value::Null, VariableKind::Outcome { .. })
                if self.cardinality == Cardinality::Single =>
            {
                match self.base_type {
                    Some(BaseType::Integer) => Value::integer(0),
                    Some(BaseType::Float) => Value::float(Decimal::ZERO),
                    _ => Value::Null,
                }
            }
            (default, _) => default.clone(),
        };
    }

    pub fn accepts(&self, value: &Value) -> bool {
        value.conforms_to(self.cardinality, self.base_type)
    }

    fn declared_type(&self) -> String {
        match self.base_type {
            Some(bt) => format!("{} {}", self.cardinality, bt),
            None => self.cardinality.to_string(),
        }
    }
}

// ──────────────────────────────────────────────
// Variable state
// ──────────────────────────────────────────────

/// Ordered identifier → variable mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableState {
    variables: Vec<Variable>,
    index: BTreeMap<String, usize>,
}

impl VariableState {
    pub fn new() -> Self {
        VariableState::default()
    }

    /// Add a variable, or replace the variable with the same identifier in
    /// place (keeping its position). Returns the replaced variable.
    pub fn insert(&mut self, variable: Variable) -> Option<Variable> {
        match self.index.get(variable.identifier()) {
            Some(&i) => Some(std::mem::replace(&mut self.variables[i], variable)),
            None => {
                self.index
                    .insert(variable.identifier().to_string(), self.variables.len());
                self.variables.push(variable);
                None
            }
        }
    }

    pub fn get(&self, identifier: &str) -> Result<&Variable, StateError> {
        self.index
            .get(identifier)
            .map(|&i| &self.variables[i])
            .ok_or_else(|| StateError::UnknownVariable {
                identifier: identifier.to_string(),
            })
    }

    pub(crate) fn get_mut(&mut self, identifier: &str) -> Result<&mut Variable, StateError> {
        match self.index.get(identifier) {
            Some(&i) => Ok(&mut self.variables[i]),
            None => Err(StateError::UnknownVariable {
                identifier: identifier.to_string(),
            }),
        }
    }

    /// Current value of a variable.
    pub fn value(&self, identifier: &str) -> Result<&Value, StateError> {
        self.get(identifier).map(Variable::value)
    }

    /// Check that `value` could be assigned to `identifier`.
    pub fn check(&self, identifier: &str, value: &Value) -> Result<(), StateError> {
        let variable = self.get(identifier)?;
        if !variable.accepts(value) {
            return Err(StateError::IncompatibleValue {
                identifier: identifier.to_string(),
                expected: variable.declared_type(),
                got: value.type_name(),
            });
        }
        Ok(())
    }

    /// Replace the current value of an existing variable.
    pub fn set(&mut self, identifier: &str, value: Value) -> Result<(), StateError> {
        self.check(identifier, &value)?;
        self.get_mut(identifier)?.value = value;
        Ok(())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Variable> {
        self.variables.iter_mut()
    }

    /// Assign without the declaration check. Unknown identifiers are
    /// ignored; used for built-in variables, which always exist.
    pub(crate) fn put(&mut self, identifier: &str, value: Value) {
        if let Ok(variable) = self.get_mut(identifier) {
            variable.value = value;
        }
    }

    /// Built-in numeric view, `None` when unset or not an integer.
    pub(crate) fn integer(&self, identifier: &str) -> Option<i64> {
        self.value(identifier)
            .ok()
            .and_then(Value::as_scalar)
            .and_then(Scalar::as_integer)
    }

    /// `{ identifier: value }` in insertion order.
    pub fn to_json(&self) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = self
            .variables
            .iter()
            .map(|v| {
                serde_json::json!({
                    "identifier": v.identifier,
                    "cardinality": v.cardinality.name(),
                    "baseType": v.base_type.map(|bt| bt.name()),
                    "value": v.value.to_json(),
                })
            })
            .collect();
        serde_json::json!({ "variables": entries })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

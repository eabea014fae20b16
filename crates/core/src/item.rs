//! Item definitions and variable declarations.
//!
//! An `ItemDefinition` is passive configuration: it is produced elsewhere
//! (typically by a document codec) and bound read-only to item sessions.
//! `ItemDefinition::validate` is the single gate that rejects malformed
//! definitions before a session is built from one.

use std::collections::BTreeSet;

use rust_decimal::Decimal;

use crate::error::DefinitionError;
use crate::rules::ResponseProcessing;
use crate::values::{BaseType, Cardinality, Scalar, Value};

/// Built-in response variable counting attempts.
pub const NUM_ATTEMPTS: &str = "numAttempts";
/// Built-in response variable holding the time spent interacting.
pub const DURATION: &str = "duration";
/// Built-in outcome variable holding the completion status.
pub const COMPLETION_STATUS: &str = "completionStatus";

pub const BUILT_IN_VARIABLES: [&str; 3] = [NUM_ATTEMPTS, DURATION, COMPLETION_STATUS];

/// Identifier syntax: a letter or underscore, then letters, digits,
/// underscores, hyphens or periods.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

// ──────────────────────────────────────────────
// Mappings and lookup tables
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub map_key: Scalar,
    pub mapped_value: Decimal,
    /// Only meaningful for string keys.
    pub case_sensitive: bool,
}

impl MapEntry {
    pub fn new(map_key: Scalar, mapped_value: Decimal) -> Self {
        MapEntry {
            map_key,
            mapped_value,
            case_sensitive: true,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    pub fn matches(&self, candidate: &Scalar) -> bool {
        match (&self.map_key, candidate) {
            (Scalar::String(key), Scalar::String(value)) if !self.case_sensitive => {
                key.to_lowercase() == value.to_lowercase()
            }
            (key, value) => key == value,
        }
    }
}

/// Value mapping of a response variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub entries: Vec<MapEntry>,
    /// Mapped value of any key with no entry.
    pub default_value: Decimal,
    pub lower_bound: Option<Decimal>,
    pub upper_bound: Option<Decimal>,
}

impl Mapping {
    pub fn new(default_value: Decimal) -> Self {
        Mapping {
            entries: Vec::new(),
            default_value,
            lower_bound: None,
            upper_bound: None,
        }
    }

    pub fn with_entry(mut self, entry: MapEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn with_bounds(mut self, lower: Option<Decimal>, upper: Option<Decimal>) -> Self {
        self.lower_bound = lower;
        self.upper_bound = upper;
        self
    }

    /// Index of the first entry matching `key`.
    pub fn find(&self, key: &Scalar) -> Option<usize> {
        self.entries.iter().position(|e| e.matches(key))
    }

    /// Clamp into `[lower_bound, upper_bound]`.
    pub fn clamp(&self, value: Decimal) -> Decimal {
        let value = self.lower_bound.map_or(value, |lower| value.max(lower));
        self.upper_bound.map_or(value, |upper| value.min(upper))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTableEntry {
    pub source_value: i64,
    pub target_value: Scalar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpolationTableEntry {
    pub source_value: Decimal,
    pub include_boundary: bool,
    pub target_value: Scalar,
}

/// Lookup table attached to an outcome declaration. Carried for the
/// consumers that derive display values; the runtime does not evaluate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupTable {
    Match {
        entries: Vec<MatchTableEntry>,
        default_value: Option<Scalar>,
    },
    Interpolation {
        entries: Vec<InterpolationTableEntry>,
        default_value: Option<Scalar>,
    },
}

// ──────────────────────────────────────────────
// Declarations
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDeclaration {
    pub identifier: String,
    pub cardinality: Cardinality,
    /// `None` only for record cardinality.
    pub base_type: Option<BaseType>,
    pub default_value: Option<Value>,
    pub correct_response: Option<Value>,
    pub mapping: Option<Mapping>,
}

impl ResponseDeclaration {
    pub fn new(identifier: &str, cardinality: Cardinality, base_type: Option<BaseType>) -> Self {
        ResponseDeclaration {
            identifier: identifier.to_string(),
            cardinality,
            base_type,
            default_value: None,
            correct_response: None,
            mapping: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_correct_response(mut self, value: Value) -> Self {
        self.correct_response = Some(value);
        self
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        check_identifier(&self.identifier)?;
        check_value(
            &self.identifier,
            "default value",
            self.default_value.as_ref(),
            self.cardinality,
            self.base_type,
        )?;
        if let Some(correct) = &self.correct_response {
            if correct.is_null() {
                return Err(DefinitionError::EmptyCorrectResponse(
                    self.identifier.clone(),
                ));
            }
        }
        check_value(
            &self.identifier,
            "correct response",
            self.correct_response.as_ref(),
            self.cardinality,
            self.base_type,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeDeclaration {
    pub identifier: String,
    pub cardinality: Cardinality,
    pub base_type: Option<BaseType>,
    pub default_value: Option<Value>,
    pub normal_minimum: Option<Decimal>,
    pub normal_maximum: Option<Decimal>,
    pub mastery_value: Option<Decimal>,
    pub lookup_table: Option<LookupTable>,
}

impl OutcomeDeclaration {
    pub fn new(identifier: &str, cardinality: Cardinality, base_type: Option<BaseType>) -> Self {
        OutcomeDeclaration {
            identifier: identifier.to_string(),
            cardinality,
            base_type,
            default_value: None,
            normal_minimum: None,
            normal_maximum: None,
            mastery_value: None,
            lookup_table: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_bounds(mut self, minimum: Option<Decimal>, maximum: Option<Decimal>) -> Self {
        self.normal_minimum = minimum;
        self.normal_maximum = maximum;
        self
    }

    pub fn with_lookup_table(mut self, table: LookupTable) -> Self {
        self.lookup_table = Some(table);
        self
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        check_identifier(&self.identifier)?;
        if let Some(LookupTable::Interpolation { entries, .. }) = &self.lookup_table {
            if entries.is_empty() {
                return Err(DefinitionError::EmptyInterpolationTable(
                    self.identifier.clone(),
                ));
            }
        }
        check_value(
            &self.identifier,
            "default value",
            self.default_value.as_ref(),
            self.cardinality,
            self.base_type,
        )
    }
}

fn check_identifier(identifier: &str) -> Result<(), DefinitionError> {
    if !is_valid_identifier(identifier) {
        return Err(DefinitionError::InvalidIdentifier(identifier.to_string()));
    }
    if BUILT_IN_VARIABLES.contains(&identifier) {
        return Err(DefinitionError::ReservedIdentifier(identifier.to_string()));
    }
    Ok(())
}

fn check_value(
    identifier: &str,
    what: &'static str,
    value: Option<&Value>,
    cardinality: Cardinality,
    base_type: Option<BaseType>,
) -> Result<(), DefinitionError> {
    match value {
        Some(v) if !v.conforms_to(cardinality, base_type) => {
            Err(DefinitionError::IncompatibleValue {
                identifier: identifier.to_string(),
                what,
                expected: match base_type {
                    Some(bt) => format!("{} {}", cardinality, bt),
                    None => cardinality.to_string(),
                },
                got: v.type_name(),
            })
        }
        _ => Ok(()),
    }
}

// ──────────────────────────────────────────────
// Item definition
// ──────────────────────────────────────────────

/// Everything a session needs to know about one assessment item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDefinition {
    pub identifier: String,
    /// Adaptive items keep outcome values across attempts and decide
    /// completion through their own response processing.
    pub adaptive: bool,
    pub response_declarations: Vec<ResponseDeclaration>,
    pub outcome_declarations: Vec<OutcomeDeclaration>,
    pub response_processing: Option<ResponseProcessing>,
}

impl ItemDefinition {
    pub fn new(identifier: &str) -> Self {
        ItemDefinition {
            identifier: identifier.to_string(),
            adaptive: false,
            response_declarations: Vec::new(),
            outcome_declarations: Vec::new(),
            response_processing: None,
        }
    }

    pub fn adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = adaptive;
        self
    }

    pub fn with_response(mut self, declaration: ResponseDeclaration) -> Self {
        self.response_declarations.push(declaration);
        self
    }

    pub fn with_outcome(mut self, declaration: OutcomeDeclaration) -> Self {
        self.outcome_declarations.push(declaration);
        self
    }

    pub fn with_response_processing(mut self, processing: ResponseProcessing) -> Self {
        self.response_processing = Some(processing);
        self
    }

    /// Reject malformed identifiers, duplicate or reserved variable names,
    /// defaults and correct responses that do not fit their declaration,
    /// and rule programs that read or assign undeclared variables.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if !is_valid_identifier(&self.identifier) {
            return Err(DefinitionError::InvalidIdentifier(self.identifier.clone()));
        }

        let mut declared: BTreeSet<&str> = BTreeSet::new();
        let identifiers = self
            .response_declarations
            .iter()
            .map(|d| d.identifier.as_str())
            .chain(self.outcome_declarations.iter().map(|d| d.identifier.as_str()));
        for identifier in identifiers {
            if !declared.insert(identifier) {
                return Err(DefinitionError::DuplicateVariable {
                    item: self.identifier.clone(),
                    identifier: identifier.to_string(),
                });
            }
        }

        for declaration in &self.response_declarations {
            declaration.validate()?;
        }
        for declaration in &self.outcome_declarations {
            declaration.validate()?;
        }

        if let Some(processing) = &self.response_processing {
            let read = processing
                .expressions()
                .into_iter()
                .flat_map(|e| e.referenced_variables());
            for identifier in read.chain(processing.assigned_variables()) {
                if !declared.contains(identifier) && !BUILT_IN_VARIABLES.contains(&identifier) {
                    return Err(DefinitionError::UndeclaredVariable {
                        item: self.identifier.clone(),
                        identifier: identifier.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;
    use crate::rules::ResponseRule;

    fn choice_item() -> ItemDefinition {
        ItemDefinition::new("choice")
            .with_response(
                ResponseDeclaration::new(
                    "RESPONSE",
                    Cardinality::Single,
                    Some(BaseType::Identifier),
                )
                    .with_correct_response(Value::identifier("ChoiceA")),
            )
            .with_outcome(OutcomeDeclaration::new(
                "SCORE",
                Cardinality::Single,
                Some(BaseType::Float),
            ))
    }

    #[test]
    fn identifier_syntax() {
        assert!(is_valid_identifier("RESPONSE"));
        assert!(is_valid_identifier("_x-1.2"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a b"));
    }

    #[test]
    fn valid_item_passes() {
        assert_eq!(choice_item().validate(), Ok(()));
    }

    #[test]
    fn duplicate_variable_rejected() {
        let item = choice_item().with_outcome(OutcomeDeclaration::new(
            "RESPONSE",
            Cardinality::Single,
            Some(BaseType::Integer),
        ));
        assert_eq!(
            item.validate(),
            Err(DefinitionError::DuplicateVariable {
                item: "choice".to_string(),
                identifier: "RESPONSE".to_string(),
            })
        );
    }

    #[test]
    fn reserved_identifier_rejected() {
        let item = ItemDefinition::new("x").with_outcome(OutcomeDeclaration::new(
            COMPLETION_STATUS,
            Cardinality::Single,
            Some(BaseType::Identifier),
        ));
        assert!(matches!(
            item.validate(),
            Err(DefinitionError::ReservedIdentifier(_))
        ));
    }

    #[test]
    fn empty_correct_response_rejected() {
        let item = ItemDefinition::new("x").with_response(
            ResponseDeclaration::new("R", Cardinality::Single, Some(BaseType::Integer))
                .with_correct_response(Value::Null),
        );
        assert_eq!(
            item.validate(),
            Err(DefinitionError::EmptyCorrectResponse("R".to_string()))
        );
    }

    #[test]
    fn mistyped_default_rejected() {
        let item = ItemDefinition::new("x").with_outcome(
            OutcomeDeclaration::new("SCORE", Cardinality::Single, Some(BaseType::Float))
                .with_default(Value::string("zero")),
        );
        assert!(matches!(
            item.validate(),
            Err(DefinitionError::IncompatibleValue { what: "default value", .. })
        ));
    }

    #[test]
    fn empty_interpolation_table_rejected() {
        let item = ItemDefinition::new("x").with_outcome(
            OutcomeDeclaration::new("GRADE", Cardinality::Single, Some(BaseType::Identifier))
                .with_lookup_table(LookupTable::Interpolation {
                    entries: vec![],
                    default_value: None,
                }),
        );
        assert_eq!(
            item.validate(),
            Err(DefinitionError::EmptyInterpolationTable("GRADE".to_string()))
        );
    }

    #[test]
    fn undeclared_variable_in_rules_rejected() {
        let item = choice_item().with_response_processing(ResponseProcessing::new(vec![
            ResponseRule::set_outcome_value("TOTAL", Expression::variable("SCORE")),
        ]));
        assert_eq!(
            item.validate(),
            Err(DefinitionError::UndeclaredVariable {
                item: "choice".to_string(),
                identifier: "TOTAL".to_string(),
            })
        );
    }

    #[test]
    fn rules_may_use_built_ins() {
        let item = choice_item().with_response_processing(ResponseProcessing::new(vec![
            ResponseRule::set_outcome_value(COMPLETION_STATUS, Expression::identifier("completed")),
        ]));
        assert_eq!(item.validate(), Ok(()));
    }

    #[test]
    fn case_insensitive_map_entry() {
        let entry = MapEntry::new(Scalar::String("Paris".to_string()), Decimal::ONE)
            .case_insensitive();
        assert!(entry.matches(&Scalar::String("PARIS".to_string())));
        let strict = MapEntry::new(Scalar::String("Paris".to_string()), Decimal::ONE);
        assert!(!strict.matches(&Scalar::String("paris".to_string())));
    }

    #[test]
    fn mapping_clamps_to_bounds() {
        let mapping =
            Mapping::new(Decimal::ZERO).with_bounds(Some(Decimal::ZERO), Some(Decimal::TWO));
        assert_eq!(mapping.clamp(Decimal::from(5)), Decimal::TWO);
        assert_eq!(mapping.clamp(Decimal::from(-1)), Decimal::ZERO);
        assert_eq!(mapping.clamp(Decimal::ONE), Decimal::ONE);
    }
}

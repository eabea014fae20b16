//! Item session state machine.
//!
//! An `AssessmentItemSession` tracks one candidate's interaction with one
//! item occurrence: attempts, time spent, suspension and completion. It owns
//! a `VariableState` seeded from the bound item definition, and runs the
//! item's response processing at the end of each attempt.
//!
//! The session never reads the clock. Callers report the current time with
//! `set_time`; max-time closure is checked there and in `begin_attempt` /
//! `end_attempt`. Every guard runs before any mutation, except the
//! minimum-time check in `end_attempt`, which suspends the session before
//! raising `DurationUnderflow`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use qti_core::{
    BaseType, Cardinality, DefinitionError, ItemDefinition, ItemSessionControl, NavigationMode,
    Scalar, SubmissionMode, TimeLimits, Value, COMPLETION_STATUS, DURATION, NUM_ATTEMPTS,
};
use time::{Duration, OffsetDateTime};

use crate::error::SessionError;
use crate::policy::SessionPolicy;
use crate::rules::process_response;
use crate::state::{Variable, VariableState};

/// Candidate responses submitted at the end of an attempt, by identifier.
pub type ResponseSet = BTreeMap<String, Value>;

// ──────────────────────────────────────────────
// States
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    NotSelected,
    Initial,
    Interacting,
    Suspended,
    ModalFeedback,
    Closed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::NotSelected => "NOT_SELECTED",
            SessionState::Initial => "INITIAL",
            SessionState::Interacting => "INTERACTING",
            SessionState::Suspended => "SUSPENDED",
            SessionState::ModalFeedback => "MODAL_FEEDBACK",
            SessionState::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Values of the built-in `completionStatus` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionStatus {
    NotAttempted,
    Unknown,
    Completed,
    Incomplete,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::NotAttempted => "not_attempted",
            CompletionStatus::Unknown => "unknown",
            CompletionStatus::Completed => "completed",
            CompletionStatus::Incomplete => "incomplete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_attempted" => Some(CompletionStatus::NotAttempted),
            "unknown" => Some(CompletionStatus::Unknown),
            "completed" => Some(CompletionStatus::Completed),
            "incomplete" => Some(CompletionStatus::Incomplete),
            _ => None,
        }
    }

    pub fn to_value(self) -> Value {
        Value::identifier(self.as_str())
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Session
// ──────────────────────────────────────────────

/// Guards that refuse a state-machine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refusal {
    AttemptsOverflow,
    DurationOverflow,
    DurationUnderflow,
    StateViolation,
    SkippingForbidden,
}

/// One candidate's session on one item occurrence.
///
/// Not internally synchronized: callers serialize access. Cloning deep
/// copies every variable; the item definition and policy are shared
/// read-only.
#[derive(Debug, Clone)]
pub struct AssessmentItemSession {
    item: Arc<ItemDefinition>,
    policy: Arc<dyn SessionPolicy>,
    control: ItemSessionControl,
    time_limits: Option<TimeLimits>,
    navigation_mode: NavigationMode,
    submission_mode: SubmissionMode,
    state: SessionState,
    attempting: bool,
    time_reference: Option<OffsetDateTime>,
    variables: VariableState,
}

impl AssessmentItemSession {
    /// Bind a session to a validated item. Only the built-in variables
    /// exist until `begin_item_session`.
    pub fn new(
        item: Arc<ItemDefinition>,
        policy: Arc<dyn SessionPolicy>,
    ) -> Result<Self, DefinitionError> {
        item.validate()?;

        let mut variables = VariableState::new();
        variables.insert(
            Variable::response(NUM_ATTEMPTS, Cardinality::Single, Some(BaseType::Integer))
                .built_in(Value::integer(0)),
        );
        variables.insert(
            Variable::response(DURATION, Cardinality::Single, Some(BaseType::Duration))
                .built_in(Value::duration(Duration::ZERO)),
        );
        variables.insert(
            Variable::outcome(COMPLETION_STATUS, Cardinality::Single, Some(BaseType::Identifier))
                .built_in(CompletionStatus::NotAttempted.to_value()),
        );

        Ok(AssessmentItemSession {
            item,
            policy,
            control: ItemSessionControl::default(),
            time_limits: None,
            navigation_mode: NavigationMode::default(),
            submission_mode: SubmissionMode::default(),
            state: SessionState::NotSelected,
            attempting: false,
            time_reference: None,
            variables,
        })
    }

    pub fn with_control(mut self, control: ItemSessionControl) -> Self {
        self.control = control;
        self
    }

    pub fn with_time_limits(mut self, time_limits: TimeLimits) -> Self {
        self.time_limits = Some(time_limits);
        self
    }

    pub fn with_navigation_mode(mut self, mode: NavigationMode) -> Self {
        self.navigation_mode = mode;
        self
    }

    pub fn with_submission_mode(mut self, mode: SubmissionMode) -> Self {
        self.submission_mode = mode;
        self
    }

    pub fn item(&self) -> &ItemDefinition {
        &self.item
    }

    pub fn control(&self) -> &ItemSessionControl {
        &self.control
    }

    pub fn time_limits(&self) -> Option<&TimeLimits> {
        self.time_limits.as_ref()
    }

    pub fn navigation_mode(&self) -> NavigationMode {
        self.navigation_mode
    }

    pub fn submission_mode(&self) -> SubmissionMode {
        self.submission_mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_attempting(&self) -> bool {
        self.attempting
    }

    pub fn time_reference(&self) -> Option<OffsetDateTime> {
        self.time_reference
    }

    /// Read-only view of every variable, built-ins first.
    pub fn variables(&self) -> &VariableState {
        &self.variables
    }

    // ── Transitions ───────────────────────────

    /// Instantiate the item's variables and enter `Initial`. Outcomes get
    /// their defaults; responses start NULL.
    pub fn begin_item_session(&mut self) {
        for declaration in &self.item.outcome_declarations {
            let mut variable = Variable::from_outcome_declaration(declaration);
            variable.apply_default_value();
            self.variables.insert(variable);
        }
        for declaration in &self.item.response_declarations {
            self.variables
                .insert(Variable::from_response_declaration(declaration));
        }

        self.transition(SessionState::Initial);
        self.variables.put(DURATION, Value::duration(Duration::ZERO));
        self.variables.put(NUM_ATTEMPTS, Value::integer(0));
        self.put_completion_status(CompletionStatus::NotAttempted);
    }

    pub fn begin_attempt(&mut self) -> Result<(), SessionError> {
        let max_attempts = self.effective_max_attempts();
        let num_attempts = self.num_attempts();

        if self.state == SessionState::Closed {
            if self.submission_mode == SubmissionMode::Simultaneous && num_attempts > 0 {
                return Err(self.fail(
                    Refusal::AttemptsOverflow,
                    "a new attempt is not allowed: the only attempt of a simultaneous submission has already begun"
                        .to_string(),
                ));
            }
            if self.submission_mode == SubmissionMode::Individual
                && max_attempts != 0
                && num_attempts >= max_attempts
            {
                return Err(self.fail(
                    Refusal::AttemptsOverflow,
                    format!(
                        "a new attempt is not allowed: the maximum number of attempts ({}) is reached",
                        max_attempts
                    ),
                ));
            }
            if self.is_max_time_reached() {
                return Err(self.fail(
                    Refusal::DurationOverflow,
                    "a new attempt is not allowed: the maximum time limit is reached".to_string(),
                ));
            }
        }

        if num_attempts == 0 {
            for variable in self.variables.iter_mut().filter(|v| v.is_response()) {
                variable.apply_default_value();
            }
            self.variables.put(DURATION, Value::duration(Duration::ZERO));
            self.put_completion_status(CompletionStatus::Unknown);
        }

        self.variables
            .put(NUM_ATTEMPTS, Value::integer(i64::from(num_attempts) + 1));
        self.transition(SessionState::Interacting);
        self.attempting = true;
        Ok(())
    }

    /// End the current attempt.
    ///
    /// `responses` are merged into the variable state. With
    /// `response_processing` false the attempt is not scored and the session
    /// is left in its current state (deferred processing). `force_late`
    /// accepts the submission even after the maximum time was reached.
    pub fn end_attempt(
        &mut self,
        responses: Option<ResponseSet>,
        response_processing: bool,
        force_late: bool,
    ) -> Result<(), SessionError> {
        if self.state == SessionState::Closed
            && self.is_max_time_reached()
            && !self.allows_late_submission()
            && !force_late
        {
            return Err(self.fail(
                Refusal::DurationOverflow,
                "the maximum time to be spent on the item is reached".to_string(),
            ));
        }

        // Reaching exactly the minimum time is still an underflow.
        let min_time = self.min_time().unwrap_or(Duration::ZERO);
        if self.is_min_time_enforced() && self.duration() <= min_time {
            self.suspend()?;
            return Err(self.fail(
                Refusal::DurationUnderflow,
                "the minimum time to be spent on the item is not reached yet".to_string(),
            ));
        }

        if let Some(responses) = responses {
            for (identifier, value) in &responses {
                self.variables.check(identifier, value)?;
            }
            for (identifier, value) in responses {
                self.variables.set(&identifier, value)?;
            }
        }

        if response_processing {
            if !self.item.adaptive {
                self.reset_outcome_variables();
            }
            let item = Arc::clone(&self.item);
            if let Some(processing) = item.response_processing.as_ref().filter(|p| !p.is_empty()) {
                tracing::debug!(item = %item.identifier, "running response processing");
                process_response(processing, &mut self.variables).map_err(|source| {
                    SessionError::Runtime {
                        item: item.identifier.clone(),
                        state: self.state,
                        source,
                    }
                })?;
            }
        }

        let max_attempts = self.effective_max_attempts();
        if self.item.adaptive {
            if self.submission_mode == SubmissionMode::Individual
                && self.completion_status() == CompletionStatus::Completed
            {
                self.end_item_session();
            }
        } else {
            if self.num_attempts() >= max_attempts && max_attempts != 0 && response_processing {
                self.end_item_session();
            }
            // Set whether or not attempts remain.
            self.put_completion_status(CompletionStatus::Completed);
        }

        if self.state != SessionState::Closed && response_processing {
            self.suspend()?;
        }
        Ok(())
    }

    /// `Interacting` or `ModalFeedback` to `Suspended`.
    pub fn suspend(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Interacting | SessionState::ModalFeedback => {
                self.transition(SessionState::Suspended);
                self.attempting = false;
                Ok(())
            }
            state => Err(self.fail(
                Refusal::StateViolation,
                format!("cannot switch from state {} to state SUSPENDED", state),
            )),
        }
    }

    /// Resume an attempt interrupted by `end_candidate_session`.
    pub fn begin_candidate_session(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Suspended {
            return Err(self.fail(
                Refusal::StateViolation,
                format!("cannot switch from state {} to state INTERACTING", self.state),
            ));
        }
        if !self.attempting {
            return Err(self.fail(
                Refusal::StateViolation,
                format!(
                    "cannot switch from state {} to state INTERACTING while not attempting",
                    self.state
                ),
            ));
        }
        self.transition(SessionState::Interacting);
        Ok(())
    }

    /// Leave `Interacting` without ending the attempt.
    pub fn end_candidate_session(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Interacting {
            return Err(self.fail(
                Refusal::StateViolation,
                format!("cannot switch from state {} to state SUSPENDED", self.state),
            ));
        }
        self.end_attempt(None, false, false)?;
        self.transition(SessionState::Suspended);
        Ok(())
    }

    /// Close the session from any state.
    pub fn end_item_session(&mut self) {
        if self.state == SessionState::Interacting {
            self.transition(SessionState::Suspended);
        }
        self.transition(SessionState::Closed);
        self.attempting = false;
    }

    /// Report the current time. While interacting, the whole-second
    /// difference between this timestamp and the previous report is added
    /// to `duration`, so sub-second polls still accumulate. Reaching the
    /// maximum time clamps `duration` to it and closes the session.
    pub fn set_time(&mut self, now: OffsetDateTime) {
        if let Some(reference) = self.time_reference {
            if self.state == SessionState::Interacting {
                let elapsed =
                    Duration::seconds((now.unix_timestamp() - reference.unix_timestamp()).max(0));
                let duration = self.duration().saturating_add(elapsed);
                self.variables.put(DURATION, Value::duration(duration));
            }

            if self.is_max_time_reached() {
                if let Some(max_time) = self.max_time() {
                    if self.duration() > max_time {
                        self.variables.put(DURATION, Value::duration(max_time));
                    }
                }
                tracing::debug!(
                    item = %self.item.identifier,
                    duration = %self.duration(),
                    "maximum time reached"
                );
                self.end_item_session();
            }
        }
        self.time_reference = Some(now);
    }

    /// Submit the item with every response at its default.
    pub fn skip(&mut self) -> Result<(), SessionError> {
        if !self.control.allow_skipping && self.submission_mode == SubmissionMode::Individual {
            return Err(self.fail(
                Refusal::SkippingForbidden,
                format!("skipping item '{}' is not allowed", self.item.identifier),
            ));
        }
        for variable in self
            .variables
            .iter_mut()
            .filter(|v| v.is_response() && !v.is_built_in())
        {
            variable.apply_default_value();
        }
        self.end_attempt(None, true, false)
    }

    // ── Queries ───────────────────────────────

    /// `None` means unlimited, or not yet known for an adaptive item that
    /// has not completed.
    pub fn remaining_attempts(&self) -> Option<u32> {
        let max_attempts = self.effective_max_attempts();
        if !self.item.adaptive {
            if max_attempts == 0 {
                None
            } else if !self.is_max_time_reached() {
                Some(max_attempts.saturating_sub(self.num_attempts()))
            } else {
                Some(0)
            }
        } else if self.completion_status() == CompletionStatus::Completed {
            Some(0)
        } else {
            None
        }
    }

    /// `None` when no maximum time is in force.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.max_time().map(|max| max - self.duration())
    }

    /// Whether every declared response matches its correct response. False
    /// before selection or when any response lacks a correct response.
    pub fn is_correct(&self) -> bool {
        if self.state == SessionState::NotSelected {
            return false;
        }
        self.declared_responses().all(Variable::is_correct)
    }

    /// Whether an attempt began and at least one declared response differs
    /// from its default.
    pub fn is_responded(&self) -> bool {
        if !self.is_presented() {
            return false;
        }
        self.declared_responses().any(|variable| {
            let value = variable.value();
            let default = variable.default_value();
            match value {
                Value::Null => *default != Value::Null,
                v if v.is_null() => !default.is_null(),
                v => v != default,
            }
        })
    }

    pub fn is_presented(&self) -> bool {
        self.num_attempts() > 0
    }

    /// Always true: a session exists only for a selected item.
    pub fn is_selected(&self) -> bool {
        true
    }

    pub fn is_attempted(&self) -> bool {
        self.num_attempts() > 0
    }

    pub fn is_attemptable(&self) -> bool {
        self.remaining_attempts() != Some(0)
    }

    pub fn num_attempts(&self) -> u32 {
        self.variables
            .integer(NUM_ATTEMPTS)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    }

    pub fn duration(&self) -> Duration {
        self.variables
            .value(DURATION)
            .ok()
            .and_then(Value::as_scalar)
            .and_then(Scalar::as_duration)
            .unwrap_or(Duration::ZERO)
    }

    /// Unrecognized identifiers assigned by response processing read as
    /// `Unknown`.
    pub fn completion_status(&self) -> CompletionStatus {
        self.variables
            .value(COMPLETION_STATUS)
            .ok()
            .and_then(Value::as_scalar)
            .and_then(Scalar::as_str)
            .and_then(CompletionStatus::parse)
            .unwrap_or(CompletionStatus::Unknown)
    }

    pub fn response_variables(&self, include_built_in: bool) -> Vec<&Variable> {
        self.variables
            .iter()
            .filter(|v| v.is_response() && (include_built_in || !v.is_built_in()))
            .collect()
    }

    pub fn outcome_variables(&self, include_built_in: bool) -> Vec<&Variable> {
        self.variables
            .iter()
            .filter(|v| v.is_outcome() && (include_built_in || !v.is_built_in()))
            .collect()
    }

    pub fn variable(&self, identifier: &str) -> Result<&Variable, SessionError> {
        Ok(self.variables.get(identifier)?)
    }

    pub fn value(&self, identifier: &str) -> Result<&Value, SessionError> {
        Ok(self.variables.value(identifier)?)
    }

    pub fn set_value(&mut self, identifier: &str, value: Value) -> Result<(), SessionError> {
        Ok(self.variables.set(identifier, value)?)
    }

    // ── Internals ─────────────────────────────

    fn transition(&mut self, to: SessionState) {
        tracing::debug!(
            item = %self.item.identifier,
            from = %self.state,
            to = %to,
            "item session transition"
        );
        self.state = to;
    }

    fn fail(&self, refusal: Refusal, message: String) -> SessionError {
        tracing::warn!(
            item = %self.item.identifier,
            state = %self.state,
            ?refusal,
            "{}",
            message
        );
        let item = self.item.identifier.clone();
        let state = self.state;
        match refusal {
            Refusal::AttemptsOverflow => SessionError::AttemptsOverflow {
                item,
                state,
                message,
            },
            Refusal::DurationOverflow => SessionError::DurationOverflow {
                item,
                state,
                message,
            },
            Refusal::DurationUnderflow => SessionError::DurationUnderflow {
                item,
                state,
                message,
            },
            Refusal::StateViolation => SessionError::StateViolation {
                item,
                state,
                message,
            },
            Refusal::SkippingForbidden => SessionError::SkippingForbidden {
                item,
                state,
                message,
            },
        }
    }

    /// Simultaneous submission allows exactly one attempt.
    fn effective_max_attempts(&self) -> u32 {
        match self.submission_mode {
            SubmissionMode::Simultaneous => 1,
            SubmissionMode::Individual => self.control.max_attempts,
        }
    }

    fn max_time(&self) -> Option<Duration> {
        self.time_limits.as_ref().and_then(|t| t.max_time)
    }

    fn min_time(&self) -> Option<Duration> {
        self.time_limits.as_ref().and_then(|t| t.min_time)
    }

    fn allows_late_submission(&self) -> bool {
        self.time_limits
            .as_ref()
            .is_some_and(|t| t.allow_late_submission)
    }

    /// Minimum times apply under linear navigation only.
    fn is_min_time_enforced(&self) -> bool {
        self.min_time().is_some()
            && self.navigation_mode == NavigationMode::Linear
            && self.policy.must_consider_min_time()
    }

    fn is_max_time_reached(&self) -> bool {
        self.max_time().is_some_and(|max| self.duration() >= max)
    }

    fn put_completion_status(&mut self, status: CompletionStatus) {
        self.variables.put(COMPLETION_STATUS, status.to_value());
    }

    /// Outcomes back to their defaults, `completionStatus` excepted.
    fn reset_outcome_variables(&mut self) {
        for variable in self
            .variables
            .iter_mut()
            .filter(|v| v.is_outcome() && !v.is_built_in())
        {
            variable.apply_default_value();
        }
    }

    fn declared_responses(&self) -> impl Iterator<Item = &Variable> {
        self.variables
            .iter()
            .filter(|v| v.is_response() && !v.is_built_in())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionErrorKind;
    use crate::policy::StaticSessionPolicy;
    use qti_core::{OutcomeDeclaration, ResponseDeclaration};

    fn item() -> Arc<ItemDefinition> {
        Arc::new(
            ItemDefinition::new("q1")
                .with_response(
                    ResponseDeclaration::new(
                        "RESPONSE",
                        Cardinality::Single,
                        Some(BaseType::Identifier),
                    )
                        .with_correct_response(Value::identifier("A")),
                )
                .with_outcome(OutcomeDeclaration::new(
                    "SCORE",
                    Cardinality::Single,
                    Some(BaseType::Float),
                )),
        )
    }

    fn session() -> AssessmentItemSession {
        AssessmentItemSession::new(item(), Arc::new(StaticSessionPolicy::default())).unwrap()
    }

    #[test]
    fn built_ins_exist_from_construction() {
        let s = session();
        assert_eq!(s.state(), SessionState::NotSelected);
        assert_eq!(s.response_variables(true).len(), 2);
        assert!(s.response_variables(false).is_empty());
        assert_eq!(s.outcome_variables(true).len(), 1);
        assert_eq!(s.completion_status(), CompletionStatus::NotAttempted);
    }

    #[test]
    fn state_names_are_upper_case() {
        assert_eq!(SessionState::ModalFeedback.to_string(), "MODAL_FEEDBACK");
        assert_eq!(SessionState::NotSelected.to_string(), "NOT_SELECTED");
    }

    #[test]
    fn completion_status_round_trips_through_identifier() {
        for status in [
            CompletionStatus::NotAttempted,
            CompletionStatus::Unknown,
            CompletionStatus::Completed,
            CompletionStatus::Incomplete,
        ] {
            assert_eq!(CompletionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CompletionStatus::parse("done"), None);
    }

    #[test]
    fn suspend_from_initial_is_a_violation() {
        let mut s = session();
        s.begin_item_session();
        let err = s.suspend().unwrap_err();
        assert_eq!(err.kind(), SessionErrorKind::StateViolation);
        assert_eq!(err.state(), Some(SessionState::Initial));
        assert_eq!(
            err.to_string(),
            "item 'q1' (INITIAL): cannot switch from state INITIAL to state SUSPENDED"
        );
    }

    #[test]
    fn each_refusal_builds_its_own_error_kind() {
        let s = session();
        for (refusal, kind) in [
            (Refusal::AttemptsOverflow, SessionErrorKind::AttemptsOverflow),
            (Refusal::DurationOverflow, SessionErrorKind::DurationOverflow),
            (Refusal::DurationUnderflow, SessionErrorKind::DurationUnderflow),
            (Refusal::StateViolation, SessionErrorKind::StateViolation),
            (Refusal::SkippingForbidden, SessionErrorKind::SkippingForbidden),
        ] {
            let err = s.fail(refusal, "refused".to_string());
            assert_eq!(err.kind(), kind);
            assert_eq!(err.item(), Some("q1"));
        }
    }

    #[test]
    fn invalid_item_is_rejected() {
        let bad = Arc::new(ItemDefinition::new("1bad"));
        let err = AssessmentItemSession::new(bad, Arc::new(StaticSessionPolicy::default()))
            .unwrap_err();
        assert_eq!(err, DefinitionError::InvalidIdentifier("1bad".to_string()));
    }

    #[test]
    fn unknown_response_is_rejected_before_any_change() {
        let mut s = session();
        s.begin_item_session();
        s.begin_attempt().unwrap();
        let mut responses = ResponseSet::new();
        responses.insert("RESPONSE".to_string(), Value::identifier("A"));
        responses.insert("NOPE".to_string(), Value::identifier("A"));
        let err = s.end_attempt(Some(responses), true, false).unwrap_err();
        assert_eq!(err.kind(), SessionErrorKind::Variable);
        assert_eq!(s.value("RESPONSE").unwrap(), &Value::Null);
        assert_eq!(s.state(), SessionState::Interacting);
    }
}

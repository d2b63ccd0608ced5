use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{info, warn};

use crate::answers::{AnswerMap, AnswerState, Submission};
use crate::collect::{FormEntries, collect, fold_entries};
use crate::render::{ControlDescription, Stage, render_stage};
use crate::sink::{SinkError, SubmissionSink};
use crate::source::{SchemaSource, SourceError};
use crate::spec::schema::{Schema, SchemaError};
use crate::validate::{ValidationError, validate_profile, validate_questionnaire};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("schema failed integrity check: {0}")]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("could not load the questionnaire: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("could not save the submission: {0}")]
    Submission(#[from] SinkError),
    #[error("'{action}' is not available in the {stage} stage")]
    InvalidTransition { stage: &'static str, action: &'static str },
    #[error("a submission is already in progress")]
    SubmissionInFlight,
}

impl FlowError {
    /// Single status line shown to the respondent.
    pub fn status_message(&self) -> String {
        match self {
            FlowError::Load(_) | FlowError::Schema(_) => {
                "Could not load the questionnaire. Reload to try again.".to_string()
            }
            FlowError::Validation(ValidationError::MissingRequired(names)) => {
                format!("Please answer: {}", names.join(", "))
            }
            FlowError::Validation(ValidationError::NoEntitySelected) => {
                "Select at least one entity.".to_string()
            }
            FlowError::Validation(err) => err.to_string(),
            FlowError::Submission(_) => "Could not save your answers. Please try again.".to_string(),
            FlowError::InvalidTransition { .. } => self.to_string(),
            FlowError::SubmissionInFlight => "Your answers are being sent.".to_string(),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FlowError::Load(_) | FlowError::Schema(_))
    }
}

#[derive(Debug)]
struct FlowState {
    stage: Stage,
    answers: AnswerState,
    in_flight: bool,
    submission: Option<Submission>,
}

impl FlowState {
    fn fresh() -> Self {
        Self {
            stage: Stage::Profile,
            answers: AnswerState::new(),
            in_flight: false,
            submission: None,
        }
    }
}

/// Owns the session: schema, answer state and current stage.
///
/// Transitions are serialized through an internal lock; the lock is never held
/// across the sink call, so a second submit while one is pending is rejected.
pub struct FlowController<K> {
    schema: Schema,
    sink: K,
    state: Mutex<FlowState>,
}

impl<K: SubmissionSink> FlowController<K> {
    /// Loads and checks the schema. No controller exists when this fails.
    pub async fn boot<S>(source: &S, sink: K) -> Result<Self, FlowError>
    where
        S: SchemaSource + ?Sized,
    {
        let schema = source.load().await.map_err(LoadError::from).inspect_err(|err| {
            warn!(error = %err, "schema load failed");
        })?;
        schema.check().map_err(LoadError::from)?;
        info!(
            profile = schema.profile.len(),
            questions = schema.questions.len(),
            "questionnaire loaded"
        );
        Ok(Self::new(schema, sink))
    }

    /// Starts a session over an already checked schema.
    pub fn new(schema: Schema, sink: K) -> Self {
        Self {
            schema,
            sink,
            state: Mutex::new(FlowState::fresh()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn stage(&self) -> Stage {
        self.lock().stage
    }

    pub fn is_busy(&self) -> bool {
        self.lock().in_flight
    }

    pub fn answers(&self) -> AnswerState {
        self.lock().answers.clone()
    }

    pub fn submission(&self) -> Option<Submission> {
        self.lock().submission.clone()
    }

    /// Controls of the current stage, pre-filled from the stored answers.
    pub fn render_current(&self) -> Result<Vec<ControlDescription>, FlowError> {
        let state = self.lock();
        Ok(render_stage(state.stage, &self.schema, &state.answers)?)
    }

    /// Collects a stage against the active set its own entries produce.
    ///
    /// Visibility may depend on answers given in the same stage, so the
    /// collect/active steps repeat until the collected answers stop changing.
    /// Each round can only drop answers, which bounds the loop.
    fn collect_stage(
        &self,
        stage: Stage,
        stored: &AnswerState,
        entries: &FormEntries,
    ) -> Result<AnswerMap, SchemaError> {
        let mut draft = stored.clone();
        let mut collected = fold_entries(entries);
        let rounds = self.schema.profile.len() + self.schema.questions.len() + 1;
        for _ in 0..rounds {
            match stage {
                Stage::Profile => draft.profile = collected.clone(),
                _ => draft.responses = collected.clone(),
            }
            let controls = render_stage(stage, &self.schema, &draft)?;
            let next = collect(&controls, entries);
            if next == collected {
                break;
            }
            collected = next;
        }
        Ok(collected)
    }

    /// Profile → Questionnaire.
    pub fn advance(&self, entries: &FormEntries) -> Result<Stage, FlowError> {
        let mut state = self.lock();
        if state.stage != Stage::Profile {
            return Err(FlowError::InvalidTransition {
                stage: state.stage.as_str(),
                action: "continue",
            });
        }

        let profile = self.collect_stage(Stage::Profile, &state.answers, entries)?;
        if let Err(err) = validate_profile(&self.schema, &profile).into_result() {
            warn!(error = %err, "profile stage blocked");
            return Err(err.into());
        }

        state.answers.profile = profile;
        state.stage = Stage::Questionnaire;
        info!(stage = state.stage.as_str(), "stage advanced");
        Ok(state.stage)
    }

    /// Questionnaire → Profile; answers are kept.
    pub fn back(&self) -> Result<Stage, FlowError> {
        let mut state = self.lock();
        if state.in_flight {
            return Err(FlowError::SubmissionInFlight);
        }
        if state.stage != Stage::Questionnaire {
            return Err(FlowError::InvalidTransition {
                stage: state.stage.as_str(),
                action: "back",
            });
        }
        state.stage = Stage::Profile;
        info!(stage = state.stage.as_str(), "returned to profile");
        Ok(state.stage)
    }

    /// Questionnaire → Submitted.
    ///
    /// The active set is recomputed from the stored profile, so answers to
    /// questions that are no longer active are dropped. On sink failure the
    /// stage and answers are kept and the call may be retried.
    pub async fn submit(&self, entries: &FormEntries) -> Result<Submission, FlowError> {
        let submission = {
            let mut state = self.lock();
            if state.in_flight {
                return Err(FlowError::SubmissionInFlight);
            }
            if state.stage != Stage::Questionnaire {
                return Err(FlowError::InvalidTransition {
                    stage: state.stage.as_str(),
                    action: "submit",
                });
            }

            state.answers.responses =
                self.collect_stage(Stage::Questionnaire, &state.answers, entries)?;
            if let Err(err) = validate_questionnaire(&self.schema, &state.answers).into_result() {
                warn!(error = %err, "submission blocked");
                return Err(err.into());
            }

            state.in_flight = true;
            Submission::from_state(&state.answers)
        };

        let outcome = self.sink.insert(&submission).await;

        let mut state = self.lock();
        state.in_flight = false;
        match outcome {
            Ok(()) => {
                state.stage = Stage::Submitted;
                state.submission = Some(submission.clone());
                info!(stage = state.stage.as_str(), "submission stored");
                Ok(submission)
            }
            Err(err) => {
                warn!(error = %err, "submission sink failed");
                Err(err.into())
            }
        }
    }

    /// Discards all answers and starts over at the profile stage.
    pub fn restart(&self) -> Result<(), FlowError> {
        let mut state = self.lock();
        if state.in_flight {
            return Err(FlowError::SubmissionInFlight);
        }
        *state = FlowState::fresh();
        info!("session restarted");
        Ok(())
    }
}

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::answers::{AnswerMap, AnswerState, AnswerValue, Submission};
use crate::spec::question::{QuestionDef, QuestionType};
use crate::spec::schema::Schema;
use crate::visibility::active;

/// Recoverable failure that blocks a stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("please answer: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
    #[error("select at least one entity")]
    NoEntitySelected,
    #[error("unknown answer fields: {}", .0.join(", "))]
    UnknownFields(Vec<String>),
}

/// Outcome of validating a stage or a whole submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationReport {
    pub missing_required: Vec<String>,
    pub missing_entity_selection: bool,
    pub unknown_fields: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.missing_required.is_empty()
            && !self.missing_entity_selection
            && self.unknown_fields.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if !self.missing_required.is_empty() {
            Err(ValidationError::MissingRequired(self.missing_required))
        } else if self.missing_entity_selection {
            Err(ValidationError::NoEntitySelected)
        } else if !self.unknown_fields.is_empty() {
            Err(ValidationError::UnknownFields(self.unknown_fields))
        } else {
            Ok(())
        }
    }

    fn merge(&mut self, other: ValidationReport) {
        self.missing_required.extend(other.missing_required);
        self.missing_entity_selection |= other.missing_entity_selection;
        self.unknown_fields.extend(other.unknown_fields);
    }
}

/// Names of required questions left unanswered, in declaration order.
///
/// `entities` is the respondent's entity selection; a matrix question with no
/// selected entity is inapplicable and never reported.
pub fn validate_required(
    questions: &[&QuestionDef],
    answers: &AnswerMap,
    entities: &[String],
) -> Vec<String> {
    questions
        .iter()
        .filter(|question| question.required)
        .filter(|question| !is_satisfied(question, answers.get(&question.name), entities))
        .map(|question| question.name.clone())
        .collect()
}

fn is_satisfied(question: &QuestionDef, value: Option<&AnswerValue>, entities: &[String]) -> bool {
    match question.kind {
        QuestionType::MatrixByEntity => {
            entities.is_empty()
                || entities.iter().all(|entity| {
                    value
                        .and_then(|answer| answer.entity(entity))
                        .is_some_and(|cell| !cell.is_empty())
                })
        }
        QuestionType::SingleChoice | QuestionType::MultiChoice => {
            value.is_some_and(|answer| !answer.is_empty())
        }
    }
}

/// Whether the profile names at least one entity.
///
/// Applied on top of the generic required check whenever the schema configures
/// an entity selection, regardless of that question's `required` flag.
pub fn has_entity_selection(schema: &Schema, profile: &AnswerMap) -> bool {
    match schema.entity_question() {
        Some(name) => profile.get(name).is_some_and(|value| !value.is_empty()),
        None => true,
    }
}

/// Gate for leaving the profile stage.
pub fn validate_profile(schema: &Schema, profile: &AnswerMap) -> ValidationReport {
    let state = AnswerState {
        profile: profile.clone(),
        responses: AnswerMap::new(),
    };
    let questions = active(&schema.profile, &state);
    ValidationReport {
        missing_required: validate_required(&questions, profile, &[]),
        missing_entity_selection: !has_entity_selection(schema, profile),
        unknown_fields: Vec::new(),
    }
}

/// Gate for submitting; recomputes the active set from the current profile.
pub fn validate_questionnaire(schema: &Schema, state: &AnswerState) -> ValidationReport {
    let questions = active(&schema.questions, state);
    let entities = state.selected_entities(schema.entity_question());
    ValidationReport {
        missing_required: validate_required(&questions, &state.responses, &entities),
        missing_entity_selection: false,
        unknown_fields: Vec::new(),
    }
}

/// Validates a complete, externally supplied submission.
pub fn validate_submission(schema: &Schema, submission: &Submission) -> ValidationReport {
    let state = AnswerState {
        profile: submission.profile.clone(),
        responses: submission.responses.clone(),
    };
    let mut report = validate_profile(schema, &state.profile);
    report.merge(validate_questionnaire(schema, &state));

    let known: BTreeSet<&str> = active(&schema.profile, &state)
        .into_iter()
        .chain(active(&schema.questions, &state))
        .map(|question| question.name.as_str())
        .collect();
    report.unknown_fields = state
        .profile
        .keys()
        .chain(state.responses.keys())
        .filter(|key| !known.contains(key.as_str()))
        .cloned()
        .collect();
    report
}

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::spec::question::{Choice, QuestionDef, QuestionType};

/// Integrity failures of a loaded schema document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("choice source '{0}' is not defined")]
    UnknownSource(String),
    #[error("question name '{0}' is declared more than once")]
    DuplicateQuestion(String),
    #[error("entity selection question '{0}' is not a profile multi-choice question")]
    InvalidEntitySelection(String),
    #[error("matrix question '{0}' requires an entity selection")]
    MissingEntitySelection(String),
    #[error("matrix question '{0}' cannot be part of the profile stage")]
    MatrixInProfile(String),
}

/// Which profile answer lists the respondent's entities, and where their labels live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EntitySelection {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Immutable questionnaire document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", from = "SchemaDocument")]
pub struct Schema {
    pub profile: Vec<QuestionDef>,
    pub questions: Vec<QuestionDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_selection: Option<EntitySelection>,
    /// Named choice sources, e.g. `schools`.
    #[serde(flatten)]
    pub sources: BTreeMap<String, Vec<Choice>>,
}

/// Document as written. Top-level fields other than the stages are kept as
/// choice sources only when they read as a choice list; anything else
/// (`title`, `version`, ...) is ignored.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct SchemaDocument {
    #[serde(alias = "perfil", default)]
    profile: Vec<QuestionDef>,
    #[serde(default)]
    questions: Vec<QuestionDef>,
    #[serde(default)]
    entity_selection: Option<EntitySelection>,
    /// Named choice sources, e.g. `schools`.
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl From<SchemaDocument> for Schema {
    fn from(document: SchemaDocument) -> Self {
        let sources = document
            .extra
            .into_iter()
            .filter_map(|(id, value)| match serde_json::from_value::<Vec<Choice>>(value) {
                Ok(choices) => Some((id, choices)),
                Err(err) => {
                    debug!(field = %id, error = %err, "ignored top-level field");
                    None
                }
            })
            .collect();
        Self {
            profile: document.profile,
            questions: document.questions,
            entity_selection: document.entity_selection,
            sources,
        }
    }
}

impl Schema {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn choice_source(&self, id: &str) -> Result<&[Choice], SchemaError> {
        self.sources
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| SchemaError::UnknownSource(id.to_string()))
    }

    /// Options of a question: the named source when one is referenced, otherwise the inline list.
    pub fn choices_for<'a>(&'a self, question: &'a QuestionDef) -> Result<&'a [Choice], SchemaError> {
        match &question.choices_from {
            Some(source) => self.choice_source(source),
            None => Ok(&question.choices),
        }
    }

    pub fn profile_question(&self, name: &str) -> Option<&QuestionDef> {
        self.profile.iter().find(|question| question.name == name)
    }

    pub fn question(&self, name: &str) -> Option<&QuestionDef> {
        self.questions.iter().find(|question| question.name == name)
    }

    /// Name of the profile answer holding the selected entities, if configured.
    pub fn entity_question(&self) -> Option<&str> {
        self.entity_selection
            .as_ref()
            .map(|selection| selection.question.as_str())
    }

    /// Label of an entity id; `None` when no source is configured or the id is absent.
    pub fn entity_label(&self, entity_id: &str) -> Option<&str> {
        let source = self.entity_selection.as_ref()?.source.as_deref()?;
        self.sources
            .get(source)?
            .iter()
            .find(|choice| choice.value == entity_id)
            .map(|choice| choice.text.as_str())
    }

    /// Verifies the contracts a loader must satisfy before the flow starts.
    pub fn check(&self) -> Result<(), SchemaError> {
        if let Some(question) = self
            .profile
            .iter()
            .find(|question| question.kind == QuestionType::MatrixByEntity)
        {
            return Err(SchemaError::MatrixInProfile(question.name.clone()));
        }

        let mut seen = BTreeSet::new();
        for question in self.profile.iter().chain(&self.questions) {
            if !seen.insert(question.name.as_str()) {
                return Err(SchemaError::DuplicateQuestion(question.name.clone()));
            }
            if let Some(source) = &question.choices_from {
                self.choice_source(source)?;
            }
            if question.kind == QuestionType::MatrixByEntity && self.entity_selection.is_none() {
                return Err(SchemaError::MissingEntitySelection(question.name.clone()));
            }
        }

        if let Some(selection) = &self.entity_selection {
            match self.profile_question(&selection.question) {
                Some(question) if question.kind == QuestionType::MultiChoice => {}
                _ => {
                    return Err(SchemaError::InvalidEntitySelection(
                        selection.question.clone(),
                    ));
                }
            }
            if let Some(source) = &selection.source {
                self.choice_source(source)?;
            }
        }

        Ok(())
    }
}

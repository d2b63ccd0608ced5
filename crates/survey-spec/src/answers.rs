use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

/// A collected answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AnswerValue {
    Scalar(String),
    /// Ordered set: insertion order is kept, duplicates are ignored.
    MultiValue(Vec<String>),
    ByEntity(BTreeMap<String, String>),
}

impl AnswerValue {
    pub fn multi<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let mut set = AnswerValue::MultiValue(Vec::new());
        for value in values {
            set.push(value.into());
        }
        set
    }

    pub fn by_entity<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        AnswerValue::ByEntity(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Adds a value, promoting a scalar to a set on the second occurrence.
    ///
    /// A per-entity answer has no slot for a plain value; it is kept as is and
    /// the value is dropped.
    pub fn push(&mut self, value: String) {
        match self {
            AnswerValue::Scalar(first) => {
                let mut values = vec![std::mem::take(first)];
                if !values.contains(&value) {
                    values.push(value);
                }
                *self = AnswerValue::MultiValue(values);
            }
            AnswerValue::MultiValue(values) => {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            AnswerValue::ByEntity(_) => {
                debug!(ignored = %value, "plain value for a per-entity answer");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Scalar(value) => value.is_empty(),
            AnswerValue::MultiValue(values) => values.is_empty(),
            AnswerValue::ByEntity(map) => map.is_empty(),
        }
    }

    /// Values as a list; a scalar is a one-element list.
    pub fn values(&self) -> Vec<&str> {
        match self {
            AnswerValue::Scalar(value) if value.is_empty() => Vec::new(),
            AnswerValue::Scalar(value) => vec![value.as_str()],
            AnswerValue::MultiValue(values) => values.iter().map(String::as_str).collect(),
            AnswerValue::ByEntity(_) => Vec::new(),
        }
    }

    pub fn entity(&self, entity_id: &str) -> Option<&str> {
        match self {
            AnswerValue::ByEntity(map) => map.get(entity_id).map(String::as_str),
            _ => None,
        }
    }

    /// Whether `value` is among the selected values.
    pub fn contains(&self, value: &str) -> bool {
        self.values().contains(&value)
    }
}

pub type AnswerMap = BTreeMap<String, AnswerValue>;

/// Answers gathered so far, one map per stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerState {
    #[serde(default)]
    pub profile: AnswerMap,
    #[serde(default)]
    pub responses: AnswerMap,
}

impl AnswerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON view used by visibility predicates.
    pub fn to_context(&self) -> Value {
        json!({
            "profile": self.profile,
            "responses": self.responses,
        })
    }

    /// Entity ids listed by the profile answer `question`, in selection order.
    pub fn selected_entities(&self, question: Option<&str>) -> Vec<String> {
        question
            .and_then(|name| self.profile.get(name))
            .map(|value| value.values().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }
}

/// The consolidated record handed to the submission sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Submission {
    pub profile: AnswerMap,
    pub responses: AnswerMap,
}

impl Submission {
    pub(crate) fn from_state(state: &AnswerState) -> Self {
        Self {
            profile: state.profile.clone(),
            responses: state.responses.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(self)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, serde_cbor::Error> {
        serde_cbor::from_slice(bytes)
    }
}

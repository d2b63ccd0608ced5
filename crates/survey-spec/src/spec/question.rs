use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// Supported question kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Exactly one option may be chosen.
    #[serde(alias = "radiogroup")]
    SingleChoice,
    /// Zero or more options may be chosen.
    #[serde(alias = "checkbox")]
    MultiChoice,
    /// One single-choice group per entity selected in the profile stage.
    #[serde(alias = "matrixBySchool")]
    MatrixByEntity,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultiChoice => "multi_choice",
            QuestionType::MatrixByEntity => "matrix_by_entity",
        }
    }
}

/// A selectable `{value, text}` option.
///
/// Documents may also list bare strings, in which case the text is the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(from = "ChoiceRepr")]
pub struct Choice {
    pub value: String,
    pub text: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
        }
    }
}

#[derive(Deserialize, JsonSchema)]
#[serde(untagged)]
enum ChoiceRepr {
    Full {
        value: String,
        #[serde(default)]
        text: Option<String>,
    },
    Bare(String),
}

impl From<ChoiceRepr> for Choice {
    fn from(repr: ChoiceRepr) -> Self {
        match repr {
            ChoiceRepr::Full { value, text } => {
                let text = text.unwrap_or_else(|| value.clone());
                Choice { value, text }
            }
            ChoiceRepr::Bare(value) => Choice {
                text: value.clone(),
                value,
            },
        }
    }
}

/// Question definition shared by both stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    /// Named choice source resolved at render time instead of `choices`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if: Option<Expr>,
    /// Cosmetic column count for the option list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u8>,
}

impl QuestionDef {
    pub fn new(name: impl Into<String>, kind: QuestionType) -> Self {
        Self {
            name: name.into(),
            title: None,
            kind,
            required: false,
            choices: Vec::new(),
            choices_from: None,
            visible_if: None,
            columns: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_choices<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.choices = values
            .into_iter()
            .map(|value| {
                let value = value.into();
                Choice::new(value.clone(), value)
            })
            .collect();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.choices_from = Some(source.into());
        self
    }

    pub fn visible_if(mut self, expr: Expr) -> Self {
        self.visible_if = Some(expr);
        self
    }

    /// Display label; falls back to the name when no title is set.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn choices_accept_bare_strings_and_missing_text() {
        let question: QuestionDef = serde_json::from_value(json!({
            "name": "funcao",
            "type": "radiogroup",
            "choices": ["Docente", { "value": "coord" }, { "value": "dir", "text": "Direção" }]
        }))
        .expect("deserialize");

        assert_eq!(question.kind, QuestionType::SingleChoice);
        assert_eq!(question.choices[0], Choice::new("Docente", "Docente"));
        assert_eq!(question.choices[1], Choice::new("coord", "coord"));
        assert_eq!(question.choices[2].text, "Direção");
        assert_eq!(question.label(), "funcao");
    }

    #[test]
    fn legacy_type_labels_map_to_question_types() {
        let kinds: Vec<QuestionType> =
            serde_json::from_value(json!(["checkbox", "matrixBySchool", "multi_choice"]))
                .expect("deserialize");
        assert_eq!(
            kinds,
            vec![
                QuestionType::MultiChoice,
                QuestionType::MatrixByEntity,
                QuestionType::MultiChoice
            ]
        );
    }
}

use serde::Serialize;
use serde_json::{Value, json};

use crate::answers::{AnswerState, AnswerValue};
use crate::spec::question::{Choice, QuestionDef, QuestionType};
use crate::spec::schema::{Schema, SchemaError};
use crate::visibility::active;

/// Hint shown in place of a matrix when no entity was selected.
pub const NO_ENTITIES_HINT: &str = "Select entities in the profile to answer this section.";

/// Answer-collection stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Profile,
    Questionnaire,
    Submitted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Profile => "profile",
            Stage::Questionnaire => "questionnaire",
            Stage::Submitted => "submitted",
        }
    }
}

/// Inputs the renderer reads; never mutated.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub schema: &'a Schema,
    pub answers: &'a AnswerState,
}

impl<'a> RenderContext<'a> {
    pub fn new(schema: &'a Schema, answers: &'a AnswerState) -> Self {
        Self { schema, answers }
    }
}

/// One selectable input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlOption {
    pub id: String,
    pub value: String,
    pub label: String,
    pub checked: bool,
}

/// A group of inputs sharing one backing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlGroup {
    pub key: String,
    pub options: Vec<ControlOption>,
}

/// Single-choice group for one entity of a matrix question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityGroup {
    pub entity_id: String,
    pub label: String,
    pub group: ControlGroup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum ControlKind {
    Single { group: ControlGroup },
    Multi { group: ControlGroup },
    Matrix { entities: Vec<EntityGroup> },
    Placeholder { hint: String },
}

/// What must be displayed for one question and which value it produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlDescription {
    pub name: String,
    pub title: String,
    pub question_type: QuestionType,
    /// Effective required flag; false when the question is inapplicable.
    pub required: bool,
    pub columns: Option<u8>,
    pub disabled: bool,
    pub kind: ControlKind,
}

impl ControlDescription {
    /// False when the question cannot be answered under the current state.
    pub fn is_applicable(&self) -> bool {
        !matches!(self.kind, ControlKind::Placeholder { .. })
    }

    pub fn groups(&self) -> Vec<&ControlGroup> {
        match &self.kind {
            ControlKind::Single { group } | ControlKind::Multi { group } => vec![group],
            ControlKind::Matrix { entities } => {
                entities.iter().map(|entity| &entity.group).collect()
            }
            ControlKind::Placeholder { .. } => Vec::new(),
        }
    }
}

/// Maps one question and its context to a control description.
pub fn render(
    question: &QuestionDef,
    ctx: &RenderContext<'_>,
) -> Result<ControlDescription, SchemaError> {
    let current = ctx
        .answers
        .profile
        .get(&question.name)
        .or_else(|| ctx.answers.responses.get(&question.name));

    let kind = match question.kind {
        QuestionType::SingleChoice | QuestionType::MultiChoice => {
            let choices = ctx.schema.choices_for(question)?;
            let group = build_group(&question.name, &question.name, choices, |value| {
                current.is_some_and(|answer| answer.contains(value))
            });
            if question.kind == QuestionType::SingleChoice {
                ControlKind::Single { group }
            } else {
                ControlKind::Multi { group }
            }
        }
        QuestionType::MatrixByEntity => render_matrix(question, ctx, current)?,
    };

    let mut control = ControlDescription {
        name: question.name.clone(),
        title: question.label().to_string(),
        question_type: question.kind,
        required: question.required,
        columns: question.columns,
        disabled: false,
        kind,
    };
    control.required &= control.is_applicable();
    Ok(control)
}

fn render_matrix(
    question: &QuestionDef,
    ctx: &RenderContext<'_>,
    current: Option<&AnswerValue>,
) -> Result<ControlKind, SchemaError> {
    let entities = ctx.answers.selected_entities(ctx.schema.entity_question());
    if entities.is_empty() {
        return Ok(ControlKind::Placeholder {
            hint: NO_ENTITIES_HINT.to_string(),
        });
    }

    let choices = ctx.schema.choices_for(question)?;
    let groups = entities
        .into_iter()
        .map(|entity_id| {
            let label = ctx
                .schema
                .entity_label(&entity_id)
                .unwrap_or(&entity_id)
                .to_string();
            let key = entity_key(&question.name, &entity_id);
            let id_prefix = format!("{}_{}", question.name, entity_id);
            let selected = current.and_then(|answer| answer.entity(&entity_id));
            let group = build_group(&key, &id_prefix, choices, |value| selected == Some(value));
            EntityGroup {
                entity_id,
                label,
                group,
            }
        })
        .collect();
    Ok(ControlKind::Matrix { entities: groups })
}

fn build_group(
    key: &str,
    id_prefix: &str,
    choices: &[Choice],
    checked: impl Fn(&str) -> bool,
) -> ControlGroup {
    ControlGroup {
        key: key.to_string(),
        options: choices
            .iter()
            .map(|choice| ControlOption {
                id: format!("{}_{}", id_prefix, choice.value),
                value: choice.value.clone(),
                label: choice.text.clone(),
                checked: checked(&choice.value),
            })
            .collect(),
    }
}

/// Boundary key of a matrix cell: `base[entity]`.
pub fn entity_key(base: &str, entity_id: &str) -> String {
    format!("{}[{}]", base, entity_id)
}

/// Renders every active question of a stage, in declaration order.
pub fn render_stage(
    stage: Stage,
    schema: &Schema,
    answers: &AnswerState,
) -> Result<Vec<ControlDescription>, SchemaError> {
    let questions = match stage {
        Stage::Profile => &schema.profile,
        Stage::Questionnaire | Stage::Submitted => &schema.questions,
    };
    let ctx = RenderContext::new(schema, answers);
    let mut controls = active(questions, answers)
        .into_iter()
        .map(|question| render(question, &ctx))
        .collect::<Result<Vec<_>, _>>()?;
    if stage == Stage::Submitted {
        for control in &mut controls {
            control.disabled = true;
        }
    }
    tracing::debug!(stage = stage.as_str(), controls = controls.len(), "rendered stage");
    Ok(controls)
}

/// Structured JSON view of a rendered stage.
pub fn render_json_ui(stage: Stage, controls: &[ControlDescription]) -> Value {
    let required = controls.iter().filter(|control| control.required).count();
    json!({
        "stage": stage.as_str(),
        "required": required,
        "controls": controls,
    })
}

/// Human-friendly text view of a rendered stage.
pub fn render_text(stage: Stage, controls: &[ControlDescription]) -> String {
    let mut lines = vec![format!("Stage: {}", stage.as_str())];
    for (index, control) in controls.iter().enumerate() {
        let mut header = format!("{}. {}", index + 1, control.title);
        if control.required {
            header.push_str(" *");
        }
        if control.disabled {
            header.push_str(" (locked)");
        }
        lines.push(header);
        match &control.kind {
            ControlKind::Single { group } | ControlKind::Multi { group } => {
                let marker = if matches!(control.kind, ControlKind::Multi { .. }) {
                    ("[", "]")
                } else {
                    ("(", ")")
                };
                push_options(&mut lines, group, marker, "   ");
            }
            ControlKind::Matrix { entities } => {
                for entity in entities {
                    lines.push(format!("   {}", entity.label));
                    push_options(&mut lines, &entity.group, ("(", ")"), "     ");
                }
            }
            ControlKind::Placeholder { hint } => lines.push(format!("   {}", hint)),
        }
    }
    lines.join("\n")
}

fn push_options(lines: &mut Vec<String>, group: &ControlGroup, marker: (&str, &str), indent: &str) {
    for (index, option) in group.options.iter().enumerate() {
        let mark = if option.checked { "x" } else { " " };
        lines.push(format!(
            "{}{}{}{} {}) {}",
            indent,
            marker.0,
            mark,
            marker.1,
            index + 1,
            option.label
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AnswerValue;
    use serde_json::json;

    fn schema() -> Schema {
        serde_json::from_value(json!({
            "profile": [
                { "name": "escolas", "type": "multi_choice", "choicesFrom": "schools" }
            ],
            "questions": [
                { "name": "clima", "title": "Clima", "type": "matrix_by_entity", "required": true,
                  "choices": [{ "value": "sim", "text": "Sim" }, { "value": "nao", "text": "Não" }] }
            ],
            "entitySelection": { "question": "escolas", "source": "schools" },
            "schools": [{ "value": "S1", "text": "Escola Um" }]
        }))
        .expect("schema")
    }

    #[test]
    fn matrix_without_entities_renders_placeholder_and_is_not_required() {
        let schema = schema();
        let answers = AnswerState::new();
        let control =
            render(&schema.questions[0], &RenderContext::new(&schema, &answers)).expect("render");
        assert!(!control.is_applicable());
        assert!(!control.required);
        assert_eq!(
            control.kind,
            ControlKind::Placeholder {
                hint: NO_ENTITIES_HINT.into()
            }
        );
    }

    #[test]
    fn matrix_falls_back_to_raw_entity_id_label() {
        let schema = schema();
        let mut answers = AnswerState::new();
        answers
            .profile
            .insert("escolas".into(), AnswerValue::multi(["S1", "S9"]));
        let control =
            render(&schema.questions[0], &RenderContext::new(&schema, &answers)).expect("render");
        let ControlKind::Matrix { entities } = &control.kind else {
            panic!("expected matrix");
        };
        assert_eq!(entities[0].label, "Escola Um");
        assert_eq!(entities[1].label, "S9");
        assert_eq!(entities[1].group.key, "clima[S9]");
        assert_eq!(entities[1].group.options[0].id, "clima_S9_sim");
        assert!(control.required);
    }

    #[test]
    fn source_backed_choices_resolve_at_render_time() {
        let mut schema = schema();
        let answers = AnswerState::new();
        schema
            .sources
            .get_mut("schools")
            .expect("schools")
            .push(crate::spec::question::Choice::new("S2", "Escola Dois"));
        let control =
            render(&schema.profile[0], &RenderContext::new(&schema, &answers)).expect("render");
        assert_eq!(control.groups()[0].options.len(), 2);
    }

    #[test]
    fn unknown_source_fails_rendering() {
        let mut schema = schema();
        schema.profile[0].choices_from = Some("teams".into());
        let answers = AnswerState::new();
        let result = render(&schema.profile[0], &RenderContext::new(&schema, &answers));
        assert_eq!(result, Err(SchemaError::UnknownSource("teams".into())));
    }

    #[test]
    fn submitted_stage_locks_controls() {
        let schema = schema();
        let answers = AnswerState::new();
        let controls = render_stage(Stage::Submitted, &schema, &answers).expect("render");
        assert!(controls.iter().all(|control| control.disabled));
        let text = render_text(Stage::Submitted, &controls);
        assert!(text.contains("(locked)"));
        assert!(text.contains(NO_ENTITIES_HINT));
    }
}

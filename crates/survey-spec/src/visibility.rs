use serde_json::Value;

use crate::answers::AnswerState;
use crate::spec::question::QuestionDef;

/// How an unresolvable predicate (missing answer) is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMode {
    Visible,
    Hidden,
}

/// Evaluates a question's `visibleIf` against an answer context built by
/// [`AnswerState::to_context`].
pub fn is_visible(question: &QuestionDef, ctx: &Value, mode: VisibilityMode) -> bool {
    let Some(expr) = &question.visible_if else {
        return true;
    };
    match expr.evaluate(ctx) {
        Some(value) => value,
        None => matches!(mode, VisibilityMode::Visible),
    }
}

/// Questions whose predicate holds for `state`, in declaration order.
///
/// A predicate that cannot be resolved hides its question.
pub fn active<'a>(questions: &'a [QuestionDef], state: &AnswerState) -> Vec<&'a QuestionDef> {
    let ctx = state.to_context();
    questions
        .iter()
        .filter(|question| is_visible(question, &ctx, VisibilityMode::Hidden))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AnswerValue;
    use crate::expr::Expr;
    use crate::spec::question::QuestionType;

    fn questions() -> Vec<QuestionDef> {
        vec![
            QuestionDef::new("geral", QuestionType::SingleChoice),
            QuestionDef::new("aulas", QuestionType::SingleChoice)
                .visible_if(Expr::equals("/profile/funcao", "Docente")),
            QuestionDef::new("final", QuestionType::MultiChoice),
        ]
    }

    fn with_function(function: &str) -> AnswerState {
        let mut state = AnswerState::new();
        state
            .profile
            .insert("funcao".into(), AnswerValue::Scalar(function.into()));
        state
    }

    fn names(questions: &[&QuestionDef]) -> Vec<String> {
        questions.iter().map(|question| question.name.clone()).collect()
    }

    #[test]
    fn conditional_question_follows_profile_function() {
        let questions = questions();
        assert_eq!(
            names(&active(&questions, &with_function("Coordenador"))),
            vec!["geral", "final"]
        );
        assert_eq!(
            names(&active(&questions, &with_function("Docente"))),
            vec!["geral", "aulas", "final"]
        );
    }

    #[test]
    fn missing_answer_hides_conditional_question() {
        let questions = questions();
        assert_eq!(
            names(&active(&questions, &AnswerState::new())),
            vec!["geral", "final"]
        );
        let ctx = AnswerState::new().to_context();
        assert!(!is_visible(&questions[1], &ctx, VisibilityMode::Hidden));
        assert!(is_visible(&questions[1], &ctx, VisibilityMode::Visible));
    }

    #[test]
    fn recomputing_on_unchanged_input_is_stable() {
        let questions = questions();
        let state = with_function("Docente");
        let first = names(&active(&questions, &state));
        let second = names(&active(&questions, &state));
        assert_eq!(first, second);
    }
}

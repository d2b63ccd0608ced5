use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Predicate over the answer context used for `visibleIf`.
///
/// Paths are JSON pointers into `{ "profile": {...}, "responses": {...} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    LiteralBool { value: bool },
    Eq { path: String, value: Value },
    Contains { path: String, value: String },
    NotEmpty { path: String },
    And { expressions: Vec<Expr> },
    Or { expressions: Vec<Expr> },
    Not { expression: Box<Expr> },
}

impl Expr {
    pub fn equals(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::Eq {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn contains(path: impl Into<String>, value: impl Into<String>) -> Self {
        Expr::Contains {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Evaluates the expression; `None` when a referenced answer is missing.
    pub fn evaluate(&self, ctx: &Value) -> Option<bool> {
        match self {
            Expr::LiteralBool { value } => Some(*value),
            Expr::Eq { path, value } => ctx.pointer(path).map(|found| found == value),
            Expr::Contains { path, value } => match ctx.pointer(path)? {
                Value::Array(items) => Some(
                    items
                        .iter()
                        .any(|item| item.as_str() == Some(value.as_str())),
                ),
                Value::String(text) => Some(text == value),
                Value::Object(map) => Some(map.contains_key(value)),
                _ => Some(false),
            },
            Expr::NotEmpty { path } => Some(match ctx.pointer(path) {
                None | Some(Value::Null) => false,
                Some(Value::String(text)) => !text.is_empty(),
                Some(Value::Array(items)) => !items.is_empty(),
                Some(Value::Object(map)) => !map.is_empty(),
                Some(_) => true,
            }),
            Expr::And { expressions } => {
                for expr in expressions {
                    match expr.evaluate(ctx) {
                        Some(true) => continue,
                        Some(false) => return Some(false),
                        None => return None,
                    }
                }
                Some(true)
            }
            Expr::Or { expressions } => {
                let mut unresolved = false;
                for expr in expressions {
                    match expr.evaluate(ctx) {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => unresolved = true,
                    }
                }
                if unresolved { None } else { Some(false) }
            }
            Expr::Not { expression } => expression.evaluate(ctx).map(|value| !value),
        }
    }
}

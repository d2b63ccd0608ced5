#![allow(missing_docs)]

pub mod answers;
pub mod collect;
pub mod expr;
pub mod flow;
pub mod render;
pub mod sink;
pub mod source;
pub mod spec;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerMap, AnswerState, AnswerValue, Submission};
pub use collect::{EntryKey, FormEntries, collect, fold_entries, parse_key};
pub use expr::Expr;
pub use flow::{FlowController, FlowError, LoadError};
pub use render::{
    ControlDescription, ControlGroup, ControlKind, ControlOption, EntityGroup, NO_ENTITIES_HINT,
    RenderContext, Stage, entity_key, render, render_json_ui, render_stage, render_text,
};
pub use sink::{JsonlFileSink, MemorySink, SinkError, SubmissionSink};
pub use source::{JsonFileSource, SchemaSource, SourceError, StaticSource};
pub use spec::{Choice, EntitySelection, QuestionDef, QuestionType, Schema, SchemaError};
pub use validate::{
    ValidationError, ValidationReport, has_entity_selection, validate_profile,
    validate_questionnaire, validate_required, validate_submission,
};
pub use visibility::{VisibilityMode, active, is_visible};

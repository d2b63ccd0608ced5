pub mod question;
pub mod schema;

pub use question::{Choice, QuestionDef, QuestionType};
pub use schema::{EntitySelection, Schema, SchemaError};

//! Templates: data model, file store, selection and answer rendering

pub mod matcher;
pub mod render;
pub mod store;
pub mod types;

pub use matcher::TemplateMatcher;
pub use render::{AnswerRenderer, NO_RESULT};
pub use store::{load_template, parse_template, FileLister, FsLister, TemplateStore};
pub use types::{normalize_parens, placeholders, FieldSpec, QaPair, Template, TemplateDraft};

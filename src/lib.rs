//! # admission-qa
//!
//! Template-based question answering over university admissions data.
//!
//! A question is tagged, mapped onto a fixed set of slots (table, year,
//! school, major, district, classy), normalized, matched against authored
//! templates and answered by binding slot values and query rows into the
//! template's answer patterns.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod nlp;
pub mod query;
pub mod template;

pub use config::QaConfig;
pub use engine::{Answer, Outcome, QaEngine, NO_MATCH};
pub use error::{Error, Result};
pub use nlp::{AnalysisOptions, LexiconTagger, Slot, SlotSet, Tagger};
pub use query::{QueryBridge, SqliteBridge, ValueCatalog};
pub use template::{Template, TemplateDraft, TemplateStore, NO_RESULT};

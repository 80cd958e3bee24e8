//! Question understanding: tagging, slot extraction and normalization
//!
//! A question flows through [`Tagger`] → [`SlotExtractor`] → [`SlotNormalizer`],
//! producing a raw and a normalized [`SlotSet`].

pub mod extractor;
pub mod normalizer;
pub mod slots;
pub mod tagger;
pub mod vocabulary;

pub use extractor::SlotExtractor;
pub use normalizer::{is_valid_year, CanonicalLists, SlotNormalizer, TableKind, DEFAULT_TABLE};
pub use slots::{Slot, SlotSet, UNKNOWN};
pub use tagger::{Analysis, AnalysisOptions, LexiconTagger, TaggedToken, Tagger};
pub use vocabulary::SlotVocabulary;

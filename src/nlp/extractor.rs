//! Slot extraction from tagged tokens

use super::slots::SlotSet;
use super::tagger::TaggedToken;
use super::vocabulary::SlotVocabulary;

/// Maps a tagged question onto a raw [`SlotSet`].
///
/// Tokens are scanned in reading order and each one fills the first
/// still-unset slot it matches. Extraction never fails: an empty or
/// unrecognized question yields an all-empty slot set.
#[derive(Debug, Clone)]
pub struct SlotExtractor {
    vocabulary: SlotVocabulary,
}

impl SlotExtractor {
    pub fn new(vocabulary: SlotVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &SlotVocabulary {
        &self.vocabulary
    }

    /// Extracts raw slot values, verbatim as they appear in the question
    pub fn extract(&self, tokens: &[TaggedToken]) -> SlotSet {
        let mut slots = SlotSet::new();

        for token in tokens {
            for slot in self.vocabulary.slots() {
                if slots.is_set(slot) {
                    continue;
                }
                if let Some(surface) = self.vocabulary.match_token(slot, token) {
                    tracing::debug!(slot = %slot, word = %token.word, "slot filled");
                    slots.set(slot, surface);
                    break;
                }
            }
        }

        slots
    }
}

impl Default for SlotExtractor {
    fn default() -> Self {
        Self::new(SlotVocabulary::admissions())
    }
}

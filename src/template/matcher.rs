//! Template selection for a normalized slot set

use std::cmp::Reverse;

use super::types::Template;
use crate::nlp::SlotSet;

/// Picks the most specific template whose conditions the slots satisfy.
///
/// A template is eligible when every condition field names a slot holding a
/// usable (non-empty, not unknown) value. Eligible templates rank by the
/// number of satisfied condition fields, then by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateMatcher;

impl TemplateMatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn is_eligible(&self, template: &Template, normalized: &SlotSet) -> bool {
        template
            .condition_fields
            .iter()
            .all(|field| field.slot().is_some_and(|slot| normalized.is_known(slot)))
    }

    /// Number of condition fields backed by a usable slot value
    pub fn specificity(&self, template: &Template, normalized: &SlotSet) -> usize {
        template
            .condition_fields
            .iter()
            .filter_map(|field| field.slot())
            .filter(|slot| normalized.is_known(*slot))
            .count()
    }

    /// Eligible templates, best first
    pub fn rank<'a>(&self, normalized: &SlotSet, candidates: &'a [Template]) -> Vec<&'a Template> {
        let mut eligible: Vec<&Template> = candidates
            .iter()
            .filter(|template| self.is_eligible(template, normalized))
            .collect();
        eligible.sort_by_cached_key(|template| {
            (
                Reverse(self.specificity(template, normalized)),
                template.name.clone(),
            )
        });

        tracing::debug!(
            candidates = candidates.len(),
            eligible = eligible.len(),
            "templates ranked"
        );
        eligible
    }

    /// The best eligible template; `None` is the no-match outcome
    pub fn best<'a>(&self, normalized: &SlotSet, candidates: &'a [Template]) -> Option<&'a Template> {
        self.rank(normalized, candidates).into_iter().next()
    }
}

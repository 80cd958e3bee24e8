//! Answer rendering

use super::types::{placeholders, substitute, QaPair, Template};
use crate::error::{Error, Result};
use crate::nlp::{Slot, SlotSet};
use crate::query::Row;

/// Line emitted when a row-level answer has no rows to draw from
pub const NO_RESULT: &str = "查询结果为空！";

/// Binds slot values and query rows into a template's answer patterns
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerRenderer;

impl AnswerRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Pairs whose question placeholders are all targets or slots with usable values
    pub fn applicable_pairs<'a>(
        &self,
        template: &'a Template,
        normalized: &SlotSet,
    ) -> Vec<&'a QaPair> {
        template
            .qa_pairs
            .iter()
            .filter(|pair| {
                placeholders(&pair.question).iter().all(|name| {
                    template.is_target(name)
                        || Slot::from_name(name).is_some_and(|slot| normalized.is_known(slot))
                })
            })
            .collect()
    }

    /// Whether any applicable answer needs values from query rows
    pub fn needs_rows(&self, template: &Template, normalized: &SlotSet) -> bool {
        self.applicable_pairs(template, normalized)
            .iter()
            .any(|pair| !self.row_placeholders(&pair.answer, normalized).is_empty())
    }

    /// Rendered answer lines, in pair order then row order.
    ///
    /// When some applicable answer needs rows and there are none, the result
    /// is the single [`NO_RESULT`] line.
    pub fn render(
        &self,
        template: &Template,
        normalized: &SlotSet,
        rows: &[Row],
    ) -> Result<Vec<String>> {
        let pairs = self.applicable_pairs(template, normalized);
        let mut lines = Vec::new();

        for pair in &pairs {
            let row_level = self.row_placeholders(&pair.answer, normalized);

            if row_level.is_empty() {
                lines.push(substitute(&pair.answer, |name| {
                    Self::slot_value(normalized, name)
                }));
                continue;
            }

            for name in &row_level {
                let resolvable = template.has_field(name)
                    || Slot::from_name(name).is_some()
                    || rows.iter().any(|row| row.contains(name));
                if !resolvable {
                    return Err(Self::unresolved(template, name));
                }
            }

            if rows.is_empty() {
                tracing::debug!(template = %template.name, "no rows for row-level answer");
                return Ok(vec![NO_RESULT.to_string()]);
            }

            for row in rows {
                if let Some(missing) = row_level.iter().find(|name| !row.contains(name)) {
                    return Err(Self::unresolved(template, missing));
                }
                lines.push(substitute(&pair.answer, |name| {
                    Self::slot_value(normalized, name)
                        .or_else(|| row.get(name).map(|value| value.to_string()))
                }));
            }
        }

        tracing::debug!(
            template = %template.name,
            pairs = pairs.len(),
            lines = lines.len(),
            "answer rendered"
        );
        Ok(lines)
    }

    /// Placeholders of `pattern` that no slot value can fill
    fn row_placeholders(&self, pattern: &str, normalized: &SlotSet) -> Vec<String> {
        placeholders(pattern)
            .into_iter()
            .filter(|name| Self::slot_value(normalized, name).is_none())
            .collect()
    }

    fn slot_value(normalized: &SlotSet, name: &str) -> Option<String> {
        Slot::from_name(name)
            .filter(|slot| normalized.is_known(*slot))
            .map(|slot| normalized.get(slot).to_string())
    }

    fn unresolved(template: &Template, name: &str) -> Error {
        Error::Render {
            template: template.name.clone(),
            placeholder: name.to_string(),
        }
    }
}

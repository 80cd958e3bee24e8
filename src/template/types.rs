//! Template data model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::nlp::Slot;
use crate::query::builder::is_identifier;

/// One recognizable field with its accepted natural-language spellings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub canonical_name: String,
    pub synonyms: Vec<String>,
}

impl FieldSpec {
    pub fn new<I, S>(canonical_name: impl Into<String>, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            canonical_name: canonical_name.into(),
            synonyms: synonyms.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses `name synonym synonym ...`; `None` for a blank line
    pub fn parse_line(line: &str) -> Option<FieldSpec> {
        let mut tokens = line.split_whitespace();
        let name = tokens.next()?;
        Some(FieldSpec::new(name, tokens))
    }

    /// Authored line form of this field
    pub fn to_line(&self) -> String {
        std::iter::once(self.canonical_name.as_str())
            .chain(self.synonyms.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The slot this field names, if any
    pub fn slot(&self) -> Option<Slot> {
        Slot::from_name(&self.canonical_name)
    }
}

/// Question pattern with the answer pattern authored right after it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Authored unit pairing question forms with answer forms, gated by condition fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub condition_fields: Vec<FieldSpec>,
    pub target_fields: Vec<FieldSpec>,
    pub qa_pairs: Vec<QaPair>,
}

impl Template {
    pub fn condition_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.condition_fields
            .iter()
            .map(|f| f.canonical_name.as_str())
    }

    pub fn target_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.target_fields.iter().map(|f| f.canonical_name.as_str())
    }

    /// Whether `name` is one of this template's condition or target fields
    pub fn has_field(&self, name: &str) -> bool {
        self.condition_names().any(|n| n == name) || self.target_names().any(|n| n == name)
    }

    pub fn is_target(&self, name: &str) -> bool {
        self.target_names().any(|n| n == name)
    }

    pub fn question_patterns(&self) -> impl Iterator<Item = &str> + '_ {
        self.qa_pairs.iter().map(|p| p.question.as_str())
    }

    pub fn answer_patterns(&self) -> impl Iterator<Item = &str> + '_ {
        self.qa_pairs.iter().map(|p| p.answer.as_str())
    }
}

/// Replaces full-width parentheses with ASCII ones
pub fn normalize_parens(text: &str) -> String {
    text.replace('（', "(").replace('）', ")")
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\(([A-Za-z_][A-Za-z0-9_]*)\)").expect("placeholder pattern is valid")
    })
}

/// Placeholder names in a pattern, in order of first appearance
pub fn placeholders(pattern: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    placeholder_regex()
        .captures_iter(pattern)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Replaces each placeholder with `resolve(name)`; unresolved ones stay as written
pub fn substitute<F>(pattern: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    placeholder_regex()
        .replace_all(pattern, |caps: &regex::Captures<'_>| {
            resolve(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Pairs an interleaved line list positionally: even = question, odd = answer.
///
/// A trailing unpaired line is dropped.
pub fn pair_lines<S: AsRef<str>>(lines: &[S]) -> Vec<QaPair> {
    lines
        .chunks_exact(2)
        .map(|pair| QaPair::new(pair[0].as_ref(), pair[1].as_ref()))
        .collect()
}

/// Parses and checks a field section: names must be identifiers, unique in the section
pub(crate) fn parse_fields<S: AsRef<str>>(
    section: &str,
    lines: &[S],
) -> std::result::Result<Vec<FieldSpec>, String> {
    let mut fields = Vec::new();
    let mut names = HashSet::new();

    for line in lines {
        let Some(field) = FieldSpec::parse_line(line.as_ref()) else {
            continue;
        };
        if field.canonical_name.is_empty() {
            return Err(format!("{} field with empty canonical name", section));
        }
        if !is_identifier(&field.canonical_name) {
            return Err(format!(
                "{} field name '{}' must be an ASCII identifier",
                section, field.canonical_name
            ));
        }
        if !names.insert(field.canonical_name.clone()) {
            return Err(format!(
                "duplicate {} field '{}'",
                section, field.canonical_name
            ));
        }
        fields.push(field);
    }

    if fields.is_empty() {
        return Err(format!("{} field list must be non-empty", section));
    }
    Ok(fields)
}

/// Authored template content before it is written to the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub condition_lines: Vec<String>,
    pub target_lines: Vec<String>,
    pub question_lines: Vec<String>,
    pub answer_lines: Vec<String>,
}

impl TemplateDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conditions<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.condition_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_targets<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Adds one question pattern with its answer pattern
    pub fn with_pair(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.question_lines.push(question.into());
        self.answer_lines.push(answer.into());
        self
    }

    /// Builds a draft from the authoring form: one block of text per part,
    /// sentences interleaved question/answer line by line.
    pub fn from_text(condition_text: &str, target_text: &str, sentence_text: &str) -> Result<Self> {
        let lines = |text: &str| -> Vec<String> {
            text.lines()
                .map(|line| normalize_parens(line.trim()))
                .filter(|line| !line.is_empty())
                .collect()
        };

        let mut missing = Vec::new();
        let condition_lines = lines(condition_text);
        if condition_lines.is_empty() {
            missing.push("condition fields");
        }
        let target_lines = lines(target_text);
        if target_lines.is_empty() {
            missing.push("target fields");
        }
        let sentences = lines(sentence_text);
        if sentences.is_empty() {
            missing.push("template sentences");
        }
        if !missing.is_empty() {
            return Err(Error::TemplateValidation(format!(
                "empty input: {}",
                missing.join(", ")
            )));
        }

        if sentences.len() % 2 == 1 {
            tracing::warn!(
                "template sentences have an odd line count ({}), last line is unpaired",
                sentences.len()
            );
        }

        let (question_lines, answer_lines) = pair_lines(&sentences)
            .into_iter()
            .map(|pair| (pair.question, pair.answer))
            .unzip();

        Ok(Self {
            condition_lines,
            target_lines,
            question_lines,
            answer_lines,
        })
    }

    /// Checks the draft before it is written
    pub fn validate(&self) -> Result<()> {
        let parts = [
            ("condition fields", &self.condition_lines),
            ("target fields", &self.target_lines),
            ("question lines", &self.question_lines),
            ("answer lines", &self.answer_lines),
        ];
        for (label, lines) in parts {
            if lines.iter().all(|line| line.trim().is_empty()) {
                return Err(Error::TemplateValidation(format!("{} are empty", label)));
            }
        }

        if self.question_lines.len() != self.answer_lines.len() {
            return Err(Error::TemplateValidation(format!(
                "{} question lines but {} answer lines",
                self.question_lines.len(),
                self.answer_lines.len()
            )));
        }

        parse_fields("condition", &self.condition_lines).map_err(Error::TemplateValidation)?;
        parse_fields("target", &self.target_lines).map_err(Error::TemplateValidation)?;

        for line in self.question_lines.iter().chain(&self.answer_lines) {
            let line = line.trim();
            if line.is_empty() {
                return Err(Error::TemplateValidation(
                    "pattern lines must not be blank".to_string(),
                ));
            }
            if line.contains('\n') || line.starts_with('#') || is_section_header(line) {
                return Err(Error::TemplateValidation(format!(
                    "pattern line is not storable: {}",
                    line
                )));
            }
        }

        Ok(())
    }
}

/// `[name]` lines separate the sections of a template file
pub(crate) fn is_section_header(line: &str) -> bool {
    line.starts_with('[') && line.ends_with(']')
}

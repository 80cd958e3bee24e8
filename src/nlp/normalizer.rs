//! Canonicalization of raw slot values

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::slots::{Slot, SlotSet, UNKNOWN};
use crate::error::Error;

const PLAN_SYNONYMS: &[&str] = &[
    "招生计划", "计划招生", "招生人数", "招多少", "招收", "招生", "计划",
];
const SCORE_MAJOR_SYNONYMS: &[&str] = &[
    "专业分数", "专业录取分数", "专业分数线", "专业最低分",
];
const SCORE_PRO_SYNONYMS: &[&str] = &[
    "地区分数", "省录取分数", "录取分数线", "录取分数", "分数线", "分数", "最低分",
];

const PLAN_COLUMNS: &[&str] = &["school", "year", "major", "district", "classy", "numbers"];
const SCORE_MAJOR_COLUMNS: &[&str] = &[
    "school", "year", "major", "district", "classy", "max_score", "min_score", "avg_score",
];
const SCORE_PRO_COLUMNS: &[&str] = &[
    "school", "year", "district", "classy", "batch", "score", "min_score",
];

/// The admissions tables a question can be answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Enrollment plan per school/major/district
    AdmissionPlan,
    /// Admission scores per major
    AdmissionScoreMajor,
    /// Admission scores per district (province line)
    AdmissionScorePro,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [
        TableKind::AdmissionPlan,
        TableKind::AdmissionScoreMajor,
        TableKind::AdmissionScorePro,
    ];

    /// Table name in the data store
    pub fn table_name(&self) -> &'static str {
        match self {
            TableKind::AdmissionPlan => "admission_plan",
            TableKind::AdmissionScoreMajor => "admission_score_major",
            TableKind::AdmissionScorePro => "admission_score_pro",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            TableKind::AdmissionPlan => "计划招生",
            TableKind::AdmissionScoreMajor => "专业分数",
            TableKind::AdmissionScorePro => "地区分数",
        }
    }

    fn synonyms(&self) -> &'static [&'static str] {
        match self {
            TableKind::AdmissionPlan => PLAN_SYNONYMS,
            TableKind::AdmissionScoreMajor => SCORE_MAJOR_SYNONYMS,
            TableKind::AdmissionScorePro => SCORE_PRO_SYNONYMS,
        }
    }

    /// Looks up a table by its store name
    pub fn from_table_name(name: &str) -> Option<TableKind> {
        TableKind::ALL
            .into_iter()
            .find(|table| table.table_name() == name)
    }

    /// Resolves a table keyword, label or store name.
    ///
    /// Exact matches are tried first; then the keyword families are checked
    /// for containment, most specific family first.
    pub fn resolve(raw: &str) -> Option<TableKind> {
        let value = fold(raw);
        if value.is_empty() {
            return None;
        }

        for table in TableKind::ALL {
            if value == table.table_name()
                || value == table.label()
                || table.synonyms().iter().any(|s| *s == value)
            {
                return Some(table);
            }
        }

        [
            TableKind::AdmissionScoreMajor,
            TableKind::AdmissionScorePro,
            TableKind::AdmissionPlan,
        ]
        .into_iter()
        .find(|table| table.synonyms().iter().any(|s| value.contains(s)))
    }

    /// Columns stored in the table
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::AdmissionPlan => PLAN_COLUMNS,
            TableKind::AdmissionScoreMajor => SCORE_MAJOR_COLUMNS,
            TableKind::AdmissionScorePro => SCORE_PRO_COLUMNS,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for TableKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableKind::resolve(s).ok_or_else(|| Error::InvalidInput(format!("unknown table: {}", s)))
    }
}

/// Table used when the question names none
pub const DEFAULT_TABLE: TableKind = TableKind::AdmissionPlan;

/// Canonical spellings per slot, as known by the data store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalLists {
    lists: HashMap<Slot, Vec<String>>,
}

impl CanonicalLists {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with the list for `slot` replaced
    pub fn with<I, S>(mut self, slot: Slot, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(slot, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn insert(&mut self, slot: Slot, values: Vec<String>) {
        self.lists.insert(slot, values);
    }

    pub fn get(&self, slot: Slot) -> Option<&[String]> {
        self.lists.get(&slot).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

/// Lowercase and drop all whitespace
fn fold(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a normalized year has the 4-digit form
pub fn is_valid_year(value: &str) -> bool {
    value.len() == 4 && value.chars().all(|c| c.is_ascii_digit())
}

/// Canonicalizes raw slot values.
///
/// Pure: the same raw set and canonical lists always produce the same
/// result, and normalizing an already canonical set changes nothing.
#[derive(Debug, Clone, Default)]
pub struct SlotNormalizer {
    canonical: CanonicalLists,
}

impl SlotNormalizer {
    /// Normalizer without canonical lists (entity slots pass through)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_canonical(mut self, canonical: CanonicalLists) -> Self {
        self.canonical = canonical;
        self
    }

    /// Produces the normalized slot set
    pub fn normalize(&self, raw: &SlotSet) -> SlotSet {
        let mut normalized = SlotSet::new();
        for (slot, value) in raw.iter() {
            let value = match slot {
                Slot::Table => Self::normalize_table(value),
                Slot::Year => Self::normalize_year(value),
                _ => self.normalize_entity(slot, value),
            };
            normalized.set(slot, value);
        }
        normalized
    }

    /// Maps a table keyword onto its store name; empty input gets the default table
    pub fn normalize_table(raw: &str) -> String {
        if raw.trim().is_empty() {
            return DEFAULT_TABLE.table_name().to_string();
        }
        match TableKind::resolve(raw) {
            Some(table) => table.table_name().to_string(),
            None => UNKNOWN.to_string(),
        }
    }

    /// Keeps only the digits when they form a 4-digit year, otherwise returns the input
    pub fn normalize_year(raw: &str) -> String {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if is_valid_year(&digits) {
            digits
        } else {
            raw.to_string()
        }
    }

    fn normalize_entity(&self, slot: Slot, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        let Some(list) = self.canonical.get(slot) else {
            return raw.to_string();
        };

        let key = fold(raw);
        list.iter()
            .find(|candidate| fold(candidate) == key)
            .cloned()
            .unwrap_or_else(|| {
                tracing::debug!(slot = %slot, value = raw, "no canonical spelling");
                UNKNOWN.to_string()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_families() {
        assert_eq!(SlotNormalizer::normalize_table("招生计划"), "admission_plan");
        assert_eq!(SlotNormalizer::normalize_table("计划招生"), "admission_plan");
        assert_eq!(
            SlotNormalizer::normalize_table("专业分数线"),
            "admission_score_major"
        );
        assert_eq!(
            SlotNormalizer::normalize_table("录取分数"),
            "admission_score_pro"
        );
        assert_eq!(
            SlotNormalizer::normalize_table("admission_score_pro"),
            "admission_score_pro"
        );
    }

    #[test]
    fn test_table_default_and_unknown() {
        assert_eq!(SlotNormalizer::normalize_table(""), "admission_plan");
        assert_eq!(SlotNormalizer::normalize_table("宿舍"), UNKNOWN);
        assert_eq!(SlotNormalizer::normalize_table(UNKNOWN), UNKNOWN);
    }

    #[test]
    fn test_year_normalization() {
        assert_eq!(SlotNormalizer::normalize_year("2020年"), "2020");
        assert_eq!(SlotNormalizer::normalize_year(" 2018 "), "2018");
        assert_eq!(SlotNormalizer::normalize_year("20年"), "20年");
        assert!(is_valid_year("2020"));
        assert!(!is_valid_year("20年"));
        assert!(!is_valid_year(""));
    }

    #[test]
    fn test_entity_passthrough_without_lists() {
        let raw = SlotSet::new()
            .with(Slot::School, " Zhejiang  University ")
            .with(Slot::Major, "计算机学院");
        let normalized = SlotNormalizer::new().normalize(&raw);
        assert_eq!(normalized.school, " Zhejiang  University ");
        assert_eq!(normalized.major, "计算机学院");
        assert_eq!(normalized.district, "");
    }

    #[test]
    fn test_entity_canonicalization() {
        let canonical = CanonicalLists::new()
            .with(Slot::School, ["Zhejiang University", "浙江工业大学"])
            .with(Slot::District, ["浙江", "江苏"]);
        let normalizer = SlotNormalizer::new().with_canonical(canonical);

        let raw = SlotSet::new()
            .with(Slot::School, "zhejiang   university")
            .with(Slot::District, "火星")
            .with(Slot::Major, "软件工程");
        let normalized = normalizer.normalize(&raw);

        assert_eq!(normalized.school, "Zhejiang University");
        assert_eq!(normalized.district, UNKNOWN);
        assert_eq!(normalized.major, "软件工程");
        assert_eq!(normalized.classy, "");
        assert_eq!(normalized.table, "admission_plan");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let canonical = CanonicalLists::new().with(Slot::District, ["浙江"]);
        let normalizer = SlotNormalizer::new().with_canonical(canonical);
        let raw = SlotSet::new()
            .with(Slot::Table, "专业分数")
            .with(Slot::Year, "2019年")
            .with(Slot::District, " 浙江")
            .with(Slot::School, "某大学");

        let once = normalizer.normalize(&raw);
        let twice = normalizer.normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_table_kind_parsing() {
        assert_eq!(
            "地区分数".parse::<TableKind>().unwrap(),
            TableKind::AdmissionScorePro
        );
        assert_eq!(
            TableKind::from_table_name("admission_plan"),
            Some(TableKind::AdmissionPlan)
        );
        assert!("dormitory".parse::<TableKind>().is_err());
        assert!(!TableKind::AdmissionScorePro.has_column("major"));
        assert!(TableKind::AdmissionScorePro.has_column("batch"));
        assert!(!TableKind::AdmissionScorePro.has_column("numbers"));
        assert!(!TableKind::AdmissionPlan.has_column("batch"));
        assert!(TableKind::AdmissionPlan.has_column("numbers"));
    }
}

//! Slot vocabulary: which surface forms fill which slot

use regex::Regex;

use super::slots::Slot;
use super::tagger::TaggedToken;

/// Provinces and municipalities recognized as districts
pub const DISTRICTS: &[&str] = &[
    "北京", "天津", "上海", "重庆", "河北", "山西", "辽宁", "吉林", "黑龙江", "江苏", "浙江",
    "安徽", "福建", "江西", "山东", "河南", "湖北", "湖南", "广东", "海南", "四川", "贵州",
    "云南", "陕西", "甘肃", "青海", "台湾", "内蒙古", "广西", "西藏", "宁夏", "新疆", "香港",
    "澳门",
];

/// Keywords that select the data table
pub const TABLE_KEYWORDS: &[&str] = &[
    "招生计划", "计划招生", "招生人数", "招多少", "招收", "招生", "专业分数", "专业录取分数",
    "地区分数", "录取分数", "分数线", "分数", "最低分",
];

/// Subject categories
pub const CLASSY_KEYWORDS: &[&str] = &[
    "文科", "理科", "文史", "理工", "艺术", "体育", "综合改革", "不分文理",
];

const YEAR_PATTERN: &str = r"^(\d{4})(?:年|届|级)?$";

/// How one slot recognizes its tokens
#[derive(Debug, Clone, Default)]
pub struct SlotMatcher {
    synonyms: Vec<String>,
    ner_tags: Vec<String>,
    pattern: Option<Regex>,
}

impl SlotMatcher {
    /// Surface text this token contributes to the slot, if it matches
    fn match_token(&self, token: &TaggedToken) -> Option<String> {
        let word = token.word.trim();
        if word.is_empty() {
            return None;
        }

        if let Some(pattern) = &self.pattern {
            if let Some(caps) = pattern.captures(word) {
                let surface = caps.get(1).or_else(|| caps.get(0))?;
                return Some(surface.as_str().to_string());
            }
        }

        let lowered = word.to_lowercase();
        if self
            .synonyms
            .iter()
            .any(|synonym| lowered.contains(synonym.as_str()))
        {
            return Some(word.to_string());
        }

        if self
            .ner_tags
            .iter()
            .any(|tag| token.ner.ends_with(tag.as_str()))
        {
            return Some(word.to_string());
        }

        None
    }
}

/// Static definition of recognized slots and their synonyms.
///
/// Slots are tested in insertion order; that order decides which slot a
/// token goes to when it could fill several.
#[derive(Debug, Clone, Default)]
pub struct SlotVocabulary {
    entries: Vec<(Slot, SlotMatcher)>,
}

impl SlotVocabulary {
    /// Vocabulary that recognizes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Admissions-domain vocabulary
    pub fn admissions() -> Self {
        Self::empty()
            .with_pattern(Slot::Year, YEAR_PATTERN)
            .with_synonyms(Slot::Table, TABLE_KEYWORDS.iter().copied())
            .with_synonyms(Slot::School, ["大学", "university"])
            .with_ner_tag(Slot::School, "Ni")
            .with_synonyms(Slot::Major, ["学院", "专业", "college"])
            .with_synonyms(Slot::District, DISTRICTS.iter().copied())
            .with_ner_tag(Slot::District, "Ns")
            .with_synonyms(Slot::Classy, CLASSY_KEYWORDS.iter().copied())
    }

    fn entry_mut(&mut self, slot: Slot) -> &mut SlotMatcher {
        let index = match self.entries.iter().position(|(s, _)| *s == slot) {
            Some(index) => index,
            None => {
                self.entries.push((slot, SlotMatcher::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    /// Adds synonyms for a slot (matched case-insensitively)
    pub fn with_synonyms<I, S>(mut self, slot: Slot, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.entry_mut(slot);
        for synonym in synonyms {
            let synonym = synonym.as_ref().trim().to_lowercase();
            if !synonym.is_empty() && !entry.synonyms.contains(&synonym) {
                entry.synonyms.push(synonym);
            }
        }
        self
    }

    /// Accepts tokens whose NER tag ends with `tag` (e.g. `Ns` for places)
    pub fn with_ner_tag(mut self, slot: Slot, tag: &str) -> Self {
        self.entry_mut(slot).ner_tags.push(tag.to_string());
        self
    }

    /// Accepts tokens matching `pattern`; capture group 1, if any, is the surface text.
    ///
    /// Invalid patterns are ignored with a warning.
    pub fn with_pattern(mut self, slot: Slot, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => self.entry_mut(slot).pattern = Some(regex),
            Err(e) => tracing::warn!("ignoring invalid pattern for slot {}: {}", slot, e),
        }
        self
    }

    /// Slots in priority order
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.entries.iter().map(|(slot, _)| *slot)
    }

    /// Synonyms registered for a slot
    pub fn synonyms(&self, slot: Slot) -> &[String] {
        self.entries
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, matcher)| matcher.synonyms.as_slice())
            .unwrap_or(&[])
    }

    /// Surface text `token` contributes to `slot`, if any
    pub fn match_token(&self, slot: Slot, token: &TaggedToken) -> Option<String> {
        self.entries
            .iter()
            .find(|(s, _)| *s == slot)
            .and_then(|(_, matcher)| matcher.match_token(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(word: &str) -> TaggedToken {
        TaggedToken::new(word, "n", "O")
    }

    #[test]
    fn test_year_pattern_captures_digits() {
        let vocab = SlotVocabulary::admissions();
        assert_eq!(
            vocab.match_token(Slot::Year, &token("2020年")),
            Some("2020".to_string())
        );
        assert_eq!(
            vocab.match_token(Slot::Year, &token("2019")),
            Some("2019".to_string())
        );
        assert_eq!(vocab.match_token(Slot::Year, &token("20")), None);
    }

    #[test]
    fn test_synonyms_are_substring_tolerant() {
        let vocab = SlotVocabulary::admissions();
        assert_eq!(
            vocab.match_token(Slot::Major, &token("计算机学院")),
            Some("计算机学院".to_string())
        );
        assert_eq!(
            vocab.match_token(Slot::School, &token("Zhejiang University")),
            Some("Zhejiang University".to_string())
        );
        assert_eq!(vocab.match_token(Slot::District, &token("学院")), None);
    }

    #[test]
    fn test_ner_tag_match() {
        let vocab = SlotVocabulary::admissions();
        let place = TaggedToken::new("杭州", "ns", "S-Ns");
        assert_eq!(
            vocab.match_token(Slot::District, &place),
            Some("杭州".to_string())
        );
    }

    #[test]
    fn test_priority_order_and_custom_vocabulary() {
        let vocab = SlotVocabulary::empty()
            .with_synonyms(Slot::District, ["浙江"])
            .with_synonyms(Slot::Major, ["学院"])
            .with_synonyms(Slot::District, ["浙江", "江苏"]);

        assert_eq!(
            vocab.slots().collect::<Vec<_>>(),
            vec![Slot::District, Slot::Major]
        );
        assert_eq!(vocab.synonyms(Slot::District).len(), 2);
        assert!(vocab.synonyms(Slot::Year).is_empty());
        assert_eq!(vocab.match_token(Slot::Year, &token("2020")), None);
    }
}

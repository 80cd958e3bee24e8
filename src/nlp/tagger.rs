//! Tokenizer/tagger adapter and the default lexicon-based tagger

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::slots::Slot;
use super::vocabulary::SlotVocabulary;
use crate::error::{Error, Result};

/// One segmented word with its POS and NER tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedToken {
    /// Surface text
    pub word: String,
    /// Part of speech tag
    pub pos: String,
    /// Named entity tag
    pub ner: String,
}

impl TaggedToken {
    /// Creates a new token
    pub fn new(word: impl Into<String>, pos: impl Into<String>, ner: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            pos: pos.into(),
            ner: ner.into(),
        }
    }
}

/// Segmentation / POS / NER service consumed by the engine.
///
/// All three stages must be deterministic and index-aligned.
pub trait Tagger: Send + Sync {
    /// Splits a sentence into words
    fn segment(&self, sentence: &str) -> Result<Vec<String>>;

    /// Tags each word with a part of speech
    fn tag_pos(&self, words: &[String]) -> Result<Vec<String>>;

    /// Tags each word with a named entity label
    fn tag_ner(&self, words: &[String], pos_tags: &[String]) -> Result<Vec<String>>;

    /// Runs all three stages and zips the results
    fn tag(&self, sentence: &str) -> Result<Vec<TaggedToken>> {
        let words = self.segment(sentence)?;
        let pos_tags = self.tag_pos(&words)?;
        if pos_tags.len() != words.len() {
            return Err(Error::Tagger(format!(
                "POS tagger returned {} tags for {} words",
                pos_tags.len(),
                words.len()
            )));
        }
        let ner_tags = self.tag_ner(&words, &pos_tags)?;
        if ner_tags.len() != words.len() {
            return Err(Error::Tagger(format!(
                "NER tagger returned {} tags for {} words",
                ner_tags.len(),
                words.len()
            )));
        }

        Ok(words
            .into_iter()
            .zip(pos_tags)
            .zip(ner_tags)
            .map(|((word, pos), ner)| TaggedToken { word, pos, ner })
            .collect())
    }
}

/// Which intermediate NLP results to keep for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub segmentation: bool,
    pub pos: bool,
    pub ner: bool,
}

impl AnalysisOptions {
    /// Keep everything
    pub fn all() -> Self {
        Self {
            segmentation: true,
            pos: true,
            ner: true,
        }
    }
}

/// Intermediate NLP output, each part independently present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub segmentation: Option<Vec<String>>,
    pub pos_tags: Option<Vec<String>>,
    pub ner_tags: Option<Vec<String>>,
}

impl Analysis {
    /// Collects the parts selected by `options`
    pub fn from_tokens(tokens: &[TaggedToken], options: AnalysisOptions) -> Self {
        Self {
            segmentation: options
                .segmentation
                .then(|| tokens.iter().map(|t| t.word.clone()).collect()),
            pos_tags: options
                .pos
                .then(|| tokens.iter().map(|t| t.pos.clone()).collect()),
            ner_tags: options
                .ner
                .then(|| tokens.iter().map(|t| t.ner.clone()).collect()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segmentation.is_none() && self.pos_tags.is_none() && self.ner_tags.is_none()
    }
}

/// Forward-maximum-matching segmenter over a word lexicon.
///
/// Digit runs (optionally followed by 年) and ASCII words are kept whole;
/// characters not covered by the lexicon become single-character tokens.
#[derive(Debug, Clone, Default)]
pub struct LexiconTagger {
    /// word -> POS tag
    lexicon: HashMap<String, String>,
    /// Longest lexicon entry in chars
    max_len: usize,
}

impl LexiconTagger {
    /// Creates a tagger with an empty lexicon
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the lexicon from a slot vocabulary
    pub fn from_vocabulary(vocabulary: &SlotVocabulary) -> Self {
        let mut tagger = Self::new();
        for slot in vocabulary.slots() {
            let pos = match slot {
                Slot::District => "ns",
                Slot::School => "ni",
                _ => "n",
            };
            for word in vocabulary.synonyms(slot) {
                tagger.insert(word, pos);
            }
        }
        tagger
    }

    /// Adds plain nouns to the lexicon
    pub fn with_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words {
            self.insert(word.as_ref(), "n");
        }
        self
    }

    /// Adds one word with its POS tag
    pub fn insert(&mut self, word: &str, pos: &str) {
        let word = word.trim();
        if word.is_empty() {
            return;
        }
        self.max_len = self.max_len.max(word.chars().count());
        self.lexicon.insert(word.to_string(), pos.to_string());
    }

    /// Loads a user lexicon: one word per line, optionally followed by a POS tag
    pub async fn load_lexicon<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Tagger(format!("failed to read lexicon {}: {}", path.display(), e))
        })?;

        let mut count = 0;
        for line in content.lines() {
            let mut parts = line.split_whitespace();
            if let Some(word) = parts.next() {
                if word.starts_with('#') {
                    continue;
                }
                self.insert(word, parts.next().unwrap_or("n"));
                count += 1;
            }
        }
        tracing::debug!("loaded {} lexicon entries from {}", count, path.display());
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.lexicon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lexicon.is_empty()
    }

    fn is_year_word(word: &str) -> bool {
        let digits = word.trim_end_matches('年');
        digits.len() != word.len() && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    }
}

impl Tagger for LexiconTagger {
    fn segment(&self, sentence: &str) -> Result<Vec<String>> {
        let chars: Vec<char> = sentence.chars().collect();
        let mut words = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
                continue;
            }

            if c.is_ascii_digit() {
                let mut j = i;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == '年' {
                    j += 1;
                }
                words.push(chars[i..j].iter().collect());
                i = j;
                continue;
            }

            let longest = self.max_len.min(chars.len() - i);
            let matched = (2..=longest).rev().find_map(|len| {
                let candidate: String = chars[i..i + len].iter().collect();
                self.lexicon.contains_key(&candidate).then_some((candidate, len))
            });
            if let Some((word, len)) = matched {
                words.push(word);
                i += len;
                continue;
            }

            if c.is_ascii_alphabetic() {
                let mut j = i;
                while j < chars.len() && chars[j].is_ascii_alphanumeric() {
                    j += 1;
                }
                words.push(chars[i..j].iter().collect());
                i = j;
                continue;
            }

            words.push(c.to_string());
            i += 1;
        }

        Ok(words)
    }

    fn tag_pos(&self, words: &[String]) -> Result<Vec<String>> {
        Ok(words
            .iter()
            .map(|word| {
                if let Some(pos) = self.lexicon.get(word) {
                    pos.clone()
                } else if word.chars().all(|c| c.is_ascii_digit()) {
                    "m".to_string()
                } else if Self::is_year_word(word) {
                    "nt".to_string()
                } else if word.chars().all(|c| c.is_ascii_alphanumeric()) {
                    "ws".to_string()
                } else if word.chars().all(|c| !c.is_alphanumeric()) {
                    "wp".to_string()
                } else {
                    "x".to_string()
                }
            })
            .collect())
    }

    fn tag_ner(&self, words: &[String], pos_tags: &[String]) -> Result<Vec<String>> {
        Ok(words
            .iter()
            .zip(pos_tags)
            .map(|(_, pos)| match pos.as_str() {
                "ns" => "S-Ns".to_string(),
                "ni" => "S-Ni".to_string(),
                "nh" => "S-Nh".to_string(),
                _ => "O".to_string(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admissions_tagger() -> LexiconTagger {
        LexiconTagger::from_vocabulary(&SlotVocabulary::admissions())
            .with_words(["计算机学院", "多少"])
    }

    #[test]
    fn test_segment_with_lexicon() {
        let tagger = admissions_tagger();
        let words = tagger.segment("2020年计算机学院在浙江招生多少人").unwrap();
        assert_eq!(
            words,
            vec!["2020年", "计算机学院", "在", "浙江", "招生", "多少", "人"]
        );
    }

    #[test]
    fn test_segment_empty_sentence() {
        let tagger = admissions_tagger();
        assert!(tagger.segment("").unwrap().is_empty());
        assert!(tagger.tag("   ").unwrap().is_empty());
    }

    #[test]
    fn test_tags_are_aligned() {
        let tagger = admissions_tagger();
        let tokens = tagger.tag("2019年浙江大学在浙江招多少人？").unwrap();

        let year = tokens.iter().find(|t| t.word == "2019年").unwrap();
        assert_eq!(year.pos, "nt");
        let district = tokens.iter().find(|t| t.word == "浙江").unwrap();
        assert_eq!(district.pos, "ns");
        assert_eq!(district.ner, "S-Ns");
        let mark = tokens.last().unwrap();
        assert_eq!(mark.word, "？");
        assert_eq!(mark.pos, "wp");
    }

    #[test]
    fn test_analysis_keeps_selected_parts() {
        let tokens = vec![
            TaggedToken::new("浙江", "ns", "S-Ns"),
            TaggedToken::new("招生", "n", "O"),
        ];
        let analysis = Analysis::from_tokens(
            &tokens,
            AnalysisOptions {
                segmentation: true,
                pos: false,
                ner: true,
            },
        );
        assert_eq!(
            analysis.segmentation,
            Some(vec!["浙江".to_string(), "招生".to_string()])
        );
        assert!(analysis.pos_tags.is_none());
        assert_eq!(
            analysis.ner_tags,
            Some(vec!["S-Ns".to_string(), "O".to_string()])
        );
        assert!(Analysis::from_tokens(&tokens, AnalysisOptions::default()).is_empty());
    }

    struct MisalignedTagger;

    impl Tagger for MisalignedTagger {
        fn segment(&self, sentence: &str) -> Result<Vec<String>> {
            Ok(sentence.chars().map(|c| c.to_string()).collect())
        }

        fn tag_pos(&self, _words: &[String]) -> Result<Vec<String>> {
            Ok(vec!["n".to_string()])
        }

        fn tag_ner(&self, words: &[String], _pos: &[String]) -> Result<Vec<String>> {
            Ok(vec!["O".to_string(); words.len()])
        }
    }

    #[test]
    fn test_misaligned_tagger_is_rejected() {
        let result = MisalignedTagger.tag("浙江");
        assert!(matches!(result, Err(Error::Tagger(_))));
    }

    #[tokio::test]
    async fn test_load_lexicon() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexicon.txt");
        tokio::fs::write(&path, "# majors\n软件工程 n\n杭州 ns\n\n")
            .await
            .unwrap();

        let tagger = LexiconTagger::new().load_lexicon(&path).await.unwrap();
        assert_eq!(tagger.len(), 2);
        let tokens = tagger.tag("杭州软件工程").unwrap();
        assert_eq!(tokens[0].ner, "S-Ns");
        assert_eq!(tokens[1].word, "软件工程");
    }
}

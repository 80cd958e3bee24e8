//! Question answering pipeline
//!
//! question → tagger → extractor → normalizer → matcher → query → renderer

use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::nlp::{
    Analysis, AnalysisOptions, SlotExtractor, SlotNormalizer, SlotSet, TableKind, Tagger,
};
use crate::query::{QueryBridge, Row, SelectQuery, ValueCatalog};
use crate::template::{AnswerRenderer, Template, TemplateMatcher, TemplateStore};

/// Shown when no template fits the question
pub const NO_MATCH: &str = "没有匹配的模板：问题信息不足或无法识别";

/// How a question ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Answered {
        template: String,
        lines: Vec<String>,
        rows: Vec<Row>,
        /// Executed SQL, absent when the answer needed no data lookup
        query: Option<String>,
    },
    NoMatch,
}

/// Everything produced for one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub question: String,
    pub analysis: Analysis,
    pub raw: SlotSet,
    pub normalized: SlotSet,
    pub outcome: Outcome,
}

impl Answer {
    pub fn is_answered(&self) -> bool {
        matches!(self.outcome, Outcome::Answered { .. })
    }

    /// Answer lines; the no-match message when nothing matched
    pub fn lines(&self) -> Vec<String> {
        match &self.outcome {
            Outcome::Answered { lines, .. } => lines.clone(),
            Outcome::NoMatch => vec![NO_MATCH.to_string()],
        }
    }

    /// Plain-text report: analysis, raw slots, normalized slots, answer, rows
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        let parts = [
            ("segmentation", &self.analysis.segmentation),
            ("pos", &self.analysis.pos_tags),
            ("ner", &self.analysis.ner_tags),
        ];
        for (label, part) in parts {
            if let Some(values) = part {
                let _ = writeln!(out, "{}: {}", label, values.join(" "));
            }
        }

        let _ = writeln!(out, "raw slots:\n{}", self.raw);
        let _ = writeln!(out, "normalized slots:\n{}", self.normalized);

        out.push_str("answer:\n");
        for line in self.lines() {
            let _ = writeln!(out, "  {}", line);
        }

        if let Outcome::Answered { rows, .. } = &self.outcome {
            if !rows.is_empty() {
                out.push_str("rows:\n");
                for row in rows {
                    let _ = writeln!(out, "  {}", row);
                }
            }
        }
        out
    }
}

/// Template-based question answering engine
pub struct QaEngine {
    tagger: Arc<dyn Tagger>,
    extractor: SlotExtractor,
    normalizer: SlotNormalizer,
    store: Arc<TemplateStore>,
    matcher: TemplateMatcher,
    renderer: AnswerRenderer,
    bridge: Arc<dyn QueryBridge>,
    catalog: Option<Arc<ValueCatalog>>,
}

impl QaEngine {
    pub fn new(
        tagger: Arc<dyn Tagger>,
        store: Arc<TemplateStore>,
        bridge: Arc<dyn QueryBridge>,
    ) -> Self {
        Self {
            tagger,
            extractor: SlotExtractor::default(),
            normalizer: SlotNormalizer::new(),
            store,
            matcher: TemplateMatcher::new(),
            renderer: AnswerRenderer::new(),
            bridge,
            catalog: None,
        }
    }

    pub fn with_extractor(mut self, extractor: SlotExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_normalizer(mut self, normalizer: SlotNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Canonicalize entity slots against the values stored in the question's table
    pub fn with_catalog(mut self, catalog: Arc<ValueCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Answers one question.
    ///
    /// Unparseable questions and questions no template fits end in
    /// [`Outcome::NoMatch`]; template, query and tagger failures are errors.
    pub async fn ask(&self, question: &str, options: AnalysisOptions) -> Result<Answer> {
        let question = question.trim();
        let tokens = self.tagger.tag(question)?;
        let analysis = Analysis::from_tokens(&tokens, options);

        let raw = self.extractor.extract(&tokens);
        let normalized = self.normalize(&raw).await?;
        tracing::debug!(raw = ?raw, normalized = ?normalized, "slots extracted");

        let templates = self.store.load_all().await?;
        let outcome = self.answer(&normalized, &templates).await?;

        match &outcome {
            Outcome::Answered {
                template, lines, ..
            } => tracing::info!(template = %template, lines = lines.len(), "question answered"),
            Outcome::NoMatch => tracing::info!(question, "no template matched"),
        }

        Ok(Answer {
            question: question.to_string(),
            analysis,
            raw,
            normalized,
            outcome,
        })
    }

    async fn normalize(&self, raw: &SlotSet) -> Result<SlotSet> {
        let table = SlotNormalizer::normalize_table(&raw.table);
        match (&self.catalog, TableKind::from_table_name(&table)) {
            (Some(catalog), Some(table)) => {
                let canonical = catalog.canonical_lists(table).await?;
                Ok(self
                    .normalizer
                    .clone()
                    .with_canonical(canonical)
                    .normalize(raw))
            }
            _ => Ok(self.normalizer.normalize(raw)),
        }
    }

    /// Tries eligible templates best first; a render error abandons only that template
    async fn answer(&self, normalized: &SlotSet, templates: &[Template]) -> Result<Outcome> {
        let ranked = self.matcher.rank(normalized, templates);
        let mut last_error: Option<Error> = None;

        for template in ranked {
            match self.attempt(template, normalized).await {
                Ok(Some(outcome)) => return Ok(outcome),
                Ok(None) => {
                    tracing::debug!(template = %template.name, "template not applicable");
                }
                Err(e) if e.is_render_error() => {
                    tracing::warn!(template = %template.name, "template abandoned: {}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(Outcome::NoMatch),
        }
    }

    /// `Ok(None)` when the template has nothing to say about this question
    async fn attempt(&self, template: &Template, normalized: &SlotSet) -> Result<Option<Outcome>> {
        let (rows, query) = if self.renderer.needs_rows(template, normalized) {
            let Some(table) = TableKind::from_table_name(&normalized.table) else {
                tracing::debug!(template = %template.name, table = %normalized.table, "no data table for question");
                return Ok(None);
            };
            let missing = SelectQuery::missing_targets(template, table);
            if !missing.is_empty() {
                tracing::debug!(
                    template = %template.name,
                    table = %table,
                    missing = ?missing,
                    "targets not stored in question table"
                );
                return Ok(None);
            }

            let query = SelectQuery::for_template(template, normalized)?;
            tracing::debug!(template = %template.name, query = %query, "querying");
            let rows = self.bridge.execute(&query).await?;
            (rows, Some(query.sql()))
        } else {
            (Vec::new(), None)
        };

        let lines = self.renderer.render(template, normalized, &rows)?;
        if lines.is_empty() {
            return Ok(None);
        }

        Ok(Some(Outcome::Answered {
            template: template.name.clone(),
            lines,
            rows,
            query,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::{LexiconTagger, Slot, SlotVocabulary};
    use crate::template::{TemplateDraft, NO_RESULT};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedBridge {
        rows: Vec<Row>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryBridge for FixedBridge {
        async fn execute(&self, query: &SelectQuery) -> Result<Vec<Row>> {
            self.queries.lock().unwrap().push(query.sql());
            Ok(self.rows.clone())
        }
    }

    fn bridge(rows: Vec<Row>) -> Arc<FixedBridge> {
        Arc::new(FixedBridge {
            rows,
            queries: Mutex::new(Vec::new()),
        })
    }

    fn tagger() -> Arc<dyn Tagger> {
        Arc::new(
            LexiconTagger::from_vocabulary(&SlotVocabulary::admissions())
                .with_words(["计算机学院", "多少"]),
        )
    }

    async fn store_with_plan(dir: &TempDir) -> Arc<TemplateStore> {
        let store = TemplateStore::new(dir.path());
        let draft = TemplateDraft::new()
            .with_conditions(["year 年份", "major 专业 学院", "district 地区 省份"])
            .with_targets(["numbers 招生人数 招多少人"])
            .with_pair(
                "(year)(major)(district)(numbers)",
                "(year)年(major)在(district)招收(numbers)人",
            );
        store.build("plan_by_major", &draft).await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_ask_renders_rows() {
        let dir = TempDir::new().unwrap();
        let store = store_with_plan(&dir).await;
        let bridge = bridge(vec![Row::new().with("numbers", 120i64)]);
        let engine = QaEngine::new(tagger(), store, bridge.clone());

        let answer = engine
            .ask("2020年计算机学院在浙江招生多少人", AnalysisOptions::default())
            .await
            .unwrap();

        assert_eq!(answer.raw.year, "2020");
        assert_eq!(answer.raw.major, "计算机学院");
        assert_eq!(answer.raw.district, "浙江");
        assert_eq!(answer.normalized.table, "admission_plan");
        assert!(answer.analysis.is_empty());
        assert_eq!(answer.lines(), vec!["2020年计算机学院在浙江招收120人"]);
        assert_eq!(bridge.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_match_and_empty_result_are_distinct() {
        let dir = TempDir::new().unwrap();
        let store = store_with_plan(&dir).await;
        let engine = QaEngine::new(tagger(), store, bridge(Vec::new()));

        let no_match = engine.ask("", AnalysisOptions::all()).await.unwrap();
        assert!(!no_match.is_answered());
        assert!(no_match.raw.is_empty());
        assert_eq!(no_match.lines(), vec![NO_MATCH]);

        let empty = engine
            .ask("2020年计算机学院在浙江招生多少人", AnalysisOptions::default())
            .await
            .unwrap();
        assert!(empty.is_answered());
        assert_eq!(empty.lines(), vec![NO_RESULT]);
        assert_ne!(NO_MATCH, NO_RESULT);
    }

    #[tokio::test]
    async fn test_render_error_falls_back_to_next_template() {
        let dir = TempDir::new().unwrap();
        let store = store_with_plan(&dir).await;
        let broken = TemplateDraft::new()
            .with_conditions(["year", "major", "district", "table"])
            .with_targets(["numbers"])
            .with_pair("(year)(numbers)", "(year)年最低分(min_score)");
        store.build("broken", &broken).await.unwrap();

        let bridge = bridge(vec![Row::new().with("numbers", 7i64)]);
        let engine = QaEngine::new(tagger(), store, bridge);

        let answer = engine
            .ask("2020年计算机学院在浙江招生多少人", AnalysisOptions::default())
            .await
            .unwrap();
        match answer.outcome {
            Outcome::Answered { template, .. } => assert_eq!(template, "plan_by_major"),
            Outcome::NoMatch => panic!("expected an answer"),
        }
    }

    #[tokio::test]
    async fn test_report_order() {
        let dir = TempDir::new().unwrap();
        let store = store_with_plan(&dir).await;
        let engine = QaEngine::new(
            tagger(),
            store,
            bridge(vec![Row::new().with("numbers", 120i64)]),
        );

        let answer = engine
            .ask("2020年计算机学院在浙江招生多少人", AnalysisOptions::all())
            .await
            .unwrap();
        let text = answer.to_text();

        let positions: Vec<usize> = ["segmentation:", "raw slots:", "normalized slots:", "answer:", "rows:"]
            .iter()
            .map(|label| text.find(label).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(answer.normalized.is_known(Slot::Year));
    }
}

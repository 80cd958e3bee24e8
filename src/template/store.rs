//! File-backed template persistence
//!
//! One plain-text file per template, named after the template:
//!
//! ```text
//! [condition]
//! school 学校 高校
//! year 年份
//! [target]
//! numbers 招生人数
//! [sentences]
//! (school)(year)(numbers)
//! (school)(year)招收(numbers)人
//! ```
//!
//! Sentence lines alternate question / answer. Blank lines and `#` comments
//! are ignored, full-width parentheses are read as ASCII ones.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{Mutex, RwLock};

use super::types::{
    is_section_header, normalize_parens, pair_lines, parse_fields, Template, TemplateDraft,
};
use crate::error::{Error, Result};

const CONDITION_SECTION: &str = "condition";
const TARGET_SECTION: &str = "target";
const SENTENCES_SECTION: &str = "sentences";
const SECTIONS: [&str; 3] = [CONDITION_SECTION, TARGET_SECTION, SENTENCES_SECTION];

const TMP_SUFFIX: &str = ".tmp";

/// Directory listing collaborator
#[async_trait]
pub trait FileLister: Send + Sync {
    /// Regular files directly under `directory`
    async fn list_files(&self, directory: &Path) -> Result<Vec<PathBuf>>;
}

/// Lists files with `tokio::fs`; a missing directory lists as empty
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

#[async_trait]
impl FileLister for FsLister {
    async fn list_files(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Parses template file content
pub fn parse_template(name: &str, content: &str) -> Result<Template> {
    let content = normalize_parens(content);
    let mut sections: Vec<(&str, Vec<&str>)> = Vec::new();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if is_section_header(line) {
            let section = line[1..line.len() - 1].trim();
            let expected = SECTIONS.get(sections.len()).copied();
            if expected != Some(section) {
                return Err(Error::format(
                    name,
                    format!(
                        "unexpected section [{}], expected [{}]",
                        section,
                        expected.unwrap_or("end of file")
                    ),
                ));
            }
            sections.push((section, Vec::new()));
            continue;
        }
        match sections.last_mut() {
            Some((_, lines)) => lines.push(line),
            None => {
                return Err(Error::format(
                    name,
                    format!("line outside of any section: {}", line),
                ))
            }
        }
    }

    if sections.len() != SECTIONS.len() {
        return Err(Error::format(
            name,
            format!("missing section [{}]", SECTIONS[sections.len()]),
        ));
    }

    let condition_fields =
        parse_fields(CONDITION_SECTION, &sections[0].1).map_err(|e| Error::format(name, e))?;
    let target_fields =
        parse_fields(TARGET_SECTION, &sections[1].1).map_err(|e| Error::format(name, e))?;

    let sentences = &sections[2].1;
    if sentences.len() % 2 == 1 {
        tracing::warn!(
            template = name,
            "odd number of sentence lines, dropping trailing line"
        );
    }
    let qa_pairs = pair_lines(sentences);
    if qa_pairs.is_empty() {
        return Err(Error::format(name, "no question/answer lines"));
    }

    Ok(Template {
        name: name.to_string(),
        condition_fields,
        target_fields,
        qa_pairs,
    })
}

/// File content for a draft; question `i` is written right before answer `i`
pub fn render_template_file(draft: &TemplateDraft) -> String {
    let mut out = String::new();
    push_section(&mut out, CONDITION_SECTION, draft.condition_lines.iter());
    push_section(&mut out, TARGET_SECTION, draft.target_lines.iter());
    push_section(
        &mut out,
        SENTENCES_SECTION,
        draft
            .question_lines
            .iter()
            .zip(&draft.answer_lines)
            .flat_map(|(q, a)| [q, a]),
    );
    out
}

fn push_section<'a>(out: &mut String, header: &str, lines: impl Iterator<Item = &'a String>) {
    out.push_str(&format!("[{}]\n", header));
    for line in lines {
        let line = line.trim();
        if !line.is_empty() {
            out.push_str(&normalize_parens(line));
            out.push('\n');
        }
    }
}

/// Loads one template file; the template is named after the file
pub async fn load_template<P: AsRef<Path>>(path: P) -> Result<Template> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("not a template file: {}", path.display())))?;

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::TemplateNotFound(name.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    parse_template(name, &content)
}

fn check_name(name: &str) -> Result<()> {
    let valid = !name.trim().is_empty()
        && name.trim() == name
        && !name.starts_with('.')
        && !name.ends_with(TMP_SUFFIX)
        && !name.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid template name: '{}'", name)))
    }
}

#[derive(Debug, Clone)]
struct CachedTemplate {
    template: Template,
    modified: Option<SystemTime>,
}

/// Owns the template directory.
///
/// Reads are lock-free apart from the optional cache; builds are serialized
/// per template name and replace the file atomically.
pub struct TemplateStore {
    root: PathBuf,
    lister: Arc<dyn FileLister>,
    cache: Option<RwLock<HashMap<String, CachedTemplate>>>,
    build_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TemplateStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            lister: Arc::new(FsLister),
            cache: None,
            build_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_lister(mut self, lister: Arc<dyn FileLister>) -> Self {
        self.lister = lister;
        self
    }

    /// Keeps parsed templates in memory, re-checked against the file on every load
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(|| RwLock::new(HashMap::new()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        Ok(self.root.join(name))
    }

    /// Template names, sorted
    pub async fn list(&self) -> Result<Vec<String>> {
        let files = self.lister.list_files(&self.root).await?;
        let mut names: Vec<String> = files
            .iter()
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()))
            .filter(|name| check_name(name).is_ok())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Loads one template by name
    pub async fn load(&self, name: &str) -> Result<Template> {
        let path = self.path_for(name)?;

        let Some(cache) = &self.cache else {
            return load_template(&path).await;
        };

        let modified = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.modified().ok(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                cache.write().await.remove(name);
                return Err(Error::TemplateNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(cached) = cache.read().await.get(name) {
            if modified.is_some() && cached.modified == modified {
                return Ok(cached.template.clone());
            }
        }

        let template = load_template(&path).await?;
        cache.write().await.insert(
            name.to_string(),
            CachedTemplate {
                template: template.clone(),
                modified,
            },
        );
        Ok(template)
    }

    /// Loads every stored template, in name order.
    ///
    /// Files that do not parse as templates are logged and skipped.
    pub async fn load_all(&self) -> Result<Vec<Template>> {
        let mut templates = Vec::new();
        for name in self.list().await? {
            match self.load(&name).await {
                Ok(template) => templates.push(template),
                Err(e @ Error::TemplateFormat { .. }) => {
                    tracing::warn!(template = %name, "skipping unreadable template: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(templates)
    }

    /// Validates and writes a template, replacing any previous one with the same name
    pub async fn build(&self, name: &str, draft: &TemplateDraft) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        draft.validate()?;

        let lock = {
            let mut locks = self.build_locks.lock().await;
            locks.entry(name.to_string()).or_default().clone()
        };
        let written = {
            let _guard = lock.lock().await;
            self.write_file(name, &path, draft).await
        };
        self.release_build_lock(name, lock).await;
        written?;

        tracing::info!(
            template = name,
            pairs = draft.question_lines.len(),
            "template built at {}",
            path.display()
        );
        Ok(path)
    }

    async fn write_file(&self, name: &str, path: &Path, draft: &TemplateDraft) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let tmp_path = self.root.join(format!(".{}{}", name, TMP_SUFFIX));
        tokio::fs::write(&tmp_path, render_template_file(draft)).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        if let Some(cache) = &self.cache {
            cache.write().await.remove(name);
        }
        Ok(())
    }

    /// Drops the per-name lock once no other build holds it
    async fn release_build_lock(&self, name: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.build_locks.lock().await;
        drop(lock);
        if locks.get(name).is_some_and(|held| Arc::strong_count(held) == 1) {
            locks.remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::types::QaPair;
    use tempfile::TempDir;

    const PLAN_FILE: &str = "\
# enrollment plan by school and year
[condition]
school 学校 高校
year 年份

[target]
numbers 招生人数 招多少人
[sentences]
（school）（year）（numbers）
(school)(year)招收(numbers)人
";

    fn draft() -> TemplateDraft {
        TemplateDraft::new()
            .with_conditions(["school 学校 高校", "year 年份"])
            .with_targets(["numbers 招生人数"])
            .with_pair("(school)(year)(numbers)", "(school)(year)招收(numbers)人")
            .with_pair("(school)(numbers)", "(school)共招收(numbers)人")
    }

    #[test]
    fn test_parse_template() {
        let template = parse_template("plan", PLAN_FILE).unwrap();
        assert_eq!(template.name, "plan");
        assert_eq!(
            template.condition_names().collect::<Vec<_>>(),
            vec!["school", "year"]
        );
        assert_eq!(template.condition_fields[0].synonyms, vec!["学校", "高校"]);
        assert_eq!(template.target_names().collect::<Vec<_>>(), vec!["numbers"]);
        assert_eq!(
            template.qa_pairs,
            vec![QaPair::new(
                "(school)(year)(numbers)",
                "(school)(year)招收(numbers)人"
            )]
        );
    }

    #[test]
    fn test_parse_rejects_malformed_files() {
        let missing_target = "[condition]\nyear\n[sentences]\nq\na\n";
        assert!(matches!(
            parse_template("t", missing_target),
            Err(Error::TemplateFormat { .. })
        ));

        let empty_conditions = "[condition]\n[target]\nnumbers\n[sentences]\nq\na\n";
        assert!(parse_template("t", empty_conditions).is_err());

        let stray_line = "year\n[condition]\nyear\n[target]\nnumbers\n[sentences]\nq\na\n";
        assert!(parse_template("t", stray_line).is_err());

        let no_pairs = "[condition]\nyear\n[target]\nnumbers\n[sentences]\nq\n";
        assert!(parse_template("t", no_pairs).is_err());

        let duplicate = "[condition]\nyear\nyear\n[target]\nnumbers\n[sentences]\nq\na\n";
        assert!(parse_template("t", duplicate).is_err());
    }

    #[test]
    fn test_parse_drops_trailing_unpaired_line() {
        let content = "[condition]\nyear\n[target]\nnumbers\n[sentences]\nq1\na1\nq2\na2\nq3\n";
        let template = parse_template("t", content).unwrap();
        assert_eq!(template.qa_pairs.len(), 2);
        assert_eq!(template.qa_pairs[1], QaPair::new("q2", "a2"));
    }

    #[test]
    fn test_rendered_file_interleaves_pairs() {
        let content = render_template_file(&draft());
        let sentences: Vec<&str> = content
            .lines()
            .skip_while(|line| *line != "[sentences]")
            .skip(1)
            .collect();
        assert_eq!(sentences.len(), 4);
        assert_eq!(sentences[0], "(school)(year)(numbers)");
        assert_eq!(sentences[1], "(school)(year)招收(numbers)人");
    }

    #[test]
    fn test_fs_lister_skips_directories() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("nested")).unwrap();
        std::fs::write(temp_dir.path().join("plan"), "").unwrap();

        let files = tokio_test::block_on(FsLister.list_files(temp_dir.path())).unwrap();
        assert_eq!(files, vec![temp_dir.path().join("plan")]);
    }

    #[tokio::test]
    async fn test_build_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path().join("templates"));

        let path = store.build("plan_by_year", &draft()).await.unwrap();
        assert!(path.exists());

        let template = store.load("plan_by_year").await.unwrap();
        assert_eq!(template.qa_pairs.len(), 2);
        assert_eq!(template.qa_pairs[1].answer, "(school)共招收(numbers)人");
        assert_eq!(store.list().await.unwrap(), vec!["plan_by_year"]);
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_draft() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path());

        let mut uneven = draft();
        uneven.answer_lines.pop();
        assert!(matches!(
            store.build("plan", &uneven).await,
            Err(Error::TemplateValidation(_))
        ));
        assert!(store.build("../plan", &draft()).await.is_err());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path().join("absent"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(
            store.load("plan").await,
            Err(Error::TemplateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cache_sees_rebuilds() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path()).with_cache(true);

        store.build("plan", &draft()).await.unwrap();
        assert_eq!(store.load("plan").await.unwrap().qa_pairs.len(), 2);

        let rebuilt = TemplateDraft::new()
            .with_conditions(["district 地区"])
            .with_targets(["numbers"])
            .with_pair("(district)(numbers)", "(district)招收(numbers)人");
        store.build("plan", &rebuilt).await.unwrap();

        let template = store.load("plan").await.unwrap();
        assert_eq!(
            template.condition_names().collect::<Vec<_>>(),
            vec!["district"]
        );
        assert_eq!(template.qa_pairs.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_builds_leave_one_complete_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(TemplateStore::new(temp_dir.path()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let draft = TemplateDraft::new()
                    .with_conditions(["year"])
                    .with_targets(["numbers"])
                    .with_pair(format!("(year)(numbers) {}", i), format!("answer {}", i));
                store.build("plan", &draft).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let template = store.load("plan").await.unwrap();
        assert_eq!(template.qa_pairs.len(), 1);
        let suffix = template.qa_pairs[0].answer.trim_start_matches("answer ");
        assert!(template.qa_pairs[0].question.ends_with(suffix));
        assert_eq!(store.list().await.unwrap(), vec!["plan"]);
        assert!(store.build_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_build_releases_lock() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("not_a_dir");
        tokio::fs::write(&root, "").await.unwrap();
        let store = TemplateStore::new(root.clone());

        let draft = TemplateDraft::new()
            .with_conditions(["year"])
            .with_targets(["numbers"])
            .with_pair("(year)(numbers)", "(numbers)");
        assert!(store.build("plan", &draft).await.is_err());
        assert!(store.build_locks.lock().await.is_empty());
    }
}

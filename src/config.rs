use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Config files tried in order when none is given
pub const CONFIG_PATHS: [&str; 2] = ["qa-config.toml", "config/qa.toml"];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QaConfig {
    pub templates: TemplatesConfig,
    pub database: DatabaseConfig,
    pub nlp: NlpConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplatesConfig {
    /// Directory holding one file per template
    pub root: String,
    /// Keep parsed templates in memory between questions
    pub cache: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL (`sqlite:path` or `sqlite::memory:`)
    pub url: String,
    pub max_connections: u32,
    /// Canonicalize entity slots against the values stored in the table
    pub canonicalize: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NlpConfig {
    /// Extra lexicon file for the segmenter
    pub lexicon: Option<String>,
    /// Print segmentation / POS / NER output with every answer
    pub show_analysis: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: Option<String>,
    pub console: bool,
    pub file: bool,
    /// Write the log file as JSON lines
    pub json: bool,
    /// daily, hourly or never
    pub rotation: String,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            templates: TemplatesConfig {
                root: "templates".to_string(),
                cache: true,
            },
            database: DatabaseConfig {
                url: "sqlite:admission.db".to_string(),
                max_connections: 5,
                canonicalize: true,
            },
            nlp: NlpConfig {
                lexicon: None,
                show_analysis: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                dir: None,
                console: true,
                file: false,
                json: false,
                rotation: "daily".to_string(),
            },
        }
    }
}

impl QaConfig {
    /// Defaults, then the config file, then `QA_*` environment variables
    /// (`QA_DATABASE__URL=sqlite:other.db`).
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut settings =
            config::Config::builder().add_source(config::Config::try_from(&QaConfig::default())?);

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::with_name(path).required(true));
            }
            None => {
                if let Some(path) = CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
                    tracing::debug!("loading config file {}", path);
                    settings = settings.add_source(config::File::with_name(path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("QA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: QaConfig = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.templates.root.trim().is_empty() {
            return Err(Error::Config("templates.root must not be empty".to_string()));
        }
        if self.database.url.trim().is_empty() {
            return Err(Error::Config("database.url must not be empty".to_string()));
        }
        if !matches!(self.logging.rotation.as_str(), "daily" | "hourly" | "never") {
            return Err(Error::Config(format!(
                "logging.rotation must be daily, hourly or never, got {}",
                self.logging.rotation
            )));
        }
        Ok(())
    }

    /// Writes a commented sample config to `path`
    pub fn generate_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(&QaConfig::default())
            .map_err(|e| Error::Config(format!("failed to serialize sample config: {}", e)))?;

        let sample_content = format!(
            r#"# admission-qa configuration
#
# Save as qa-config.toml or config/qa.toml.
# Environment variables override file values, e.g. QA_DATABASE__URL=sqlite:other.db

{}
# [templates]
# root = template directory, one file per template
# cache = keep parsed templates in memory (re-checked against the file)
#
# [database]
# canonicalize = match school/major/district/classy against stored values
#
# [nlp]
# lexicon = extra word list for the segmenter: one word per line, optional POS tag
#
# [logging]
# level = trace, debug, info, warn, error or an EnvFilter directive
# rotation = daily, hourly or never
# json = write the log file as JSON lines
"#,
            toml_content
        );

        std::fs::write(path.as_ref(), sample_content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = QaConfig::default();
        assert_eq!(config.templates.root, "templates");
        assert_eq!(config.database.max_connections, 5);
        assert!(config.nlp.lexicon.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("qa.toml");
        std::fs::write(
            &path,
            r#"
[templates]
root = "/srv/qa/templates"
cache = false

[database]
url = "sqlite::memory:"
max_connections = 1
canonicalize = false

[nlp]
lexicon = "words.txt"
show_analysis = true

[logging]
level = "debug"
console = true
file = false
json = true
rotation = "never"
"#,
        )
        .unwrap();

        let config = QaConfig::load(path.to_str()).unwrap();
        assert_eq!(config.templates.root, "/srv/qa/templates");
        assert!(!config.templates.cache);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.nlp.lexicon.as_deref(), Some("words.txt"));
        assert_eq!(config.logging.rotation, "never");
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");
        assert!(matches!(
            QaConfig::load(path.to_str()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_sample_config_loads() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sample.toml");
        QaConfig::generate_sample_config(&path).unwrap();

        let config = QaConfig::load(path.to_str()).unwrap();
        assert_eq!(config.templates, QaConfig::default().templates);
        assert_eq!(config.database, QaConfig::default().database);
    }

    #[test]
    fn test_invalid_rotation() {
        let mut config = QaConfig::default();
        config.logging.rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }
}

//! admission-qa command line entry point

use admission_qa::config::QaConfig;
use admission_qa::logging::{init_logging, LogConfig};
use admission_qa::nlp::{AnalysisOptions, LexiconTagger, SlotVocabulary, TableKind};
use admission_qa::query::{SqliteBridge, ValueCatalog};
use admission_qa::template::{TemplateDraft, TemplateStore};
use admission_qa::QaEngine;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Answers admissions questions from authored templates
#[derive(Parser, Debug)]
#[command(name = "admission-qa")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "QA_CONFIG")]
    config: Option<String>,

    /// Log level or filter directive (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a question; reads questions line by line from stdin when none is given
    Ask {
        question: Vec<String>,
        /// Show word segmentation
        #[arg(long)]
        seg: bool,
        /// Show part-of-speech tags
        #[arg(long)]
        pos: bool,
        /// Show named entity tags
        #[arg(long)]
        ner: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect and author templates
    Templates {
        #[command(subcommand)]
        action: TemplatesCommand,
    },
    /// List the distinct values stored in a table column
    Values {
        /// Table name or label (计划招生, 专业分数, 地区分数)
        table: String,
        /// Column to list
        column: String,
        /// Narrow by column=value, repeatable
        #[arg(short = 'w', long = "where", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Write a sample configuration file
    InitConfig {
        #[arg(default_value = "qa-config.toml.example")]
        output: String,
    },
}

#[derive(Subcommand, Debug)]
enum TemplatesCommand {
    /// List stored templates
    List,
    /// Print a template's fields and patterns
    Show { name: String },
    /// Build (or overwrite) a template from authored text files
    Build {
        name: String,
        /// Condition fields, one `name synonym ...` per line
        #[arg(long)]
        conditions: String,
        /// Target fields, one `name synonym ...` per line
        #[arg(long)]
        targets: String,
        /// Sentences, question and answer lines alternating
        #[arg(long)]
        sentences: String,
    },
}

fn parse_filter(value: &str) -> std::result::Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(column, value)| (column.trim().to_string(), value.trim().to_string()))
        .filter(|(column, _)| !column.is_empty())
        .ok_or_else(|| format!("expected column=value, got '{}'", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::InitConfig { output } = &cli.command {
        QaConfig::generate_sample_config(output)?;
        println!("sample configuration written to {}", output);
        return Ok(());
    }

    let config = QaConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let mut log_config = LogConfig::from_config(&config.logging);
    if let Some(level) = &cli.log_level {
        log_config = log_config.with_level(level.clone());
    }
    let _guard = init_logging(&log_config)?;

    let store = Arc::new(
        TemplateStore::new(&config.templates.root).with_cache(config.templates.cache),
    );

    match cli.command {
        Command::Ask {
            question,
            seg,
            pos,
            ner,
            json,
        } => {
            let mut options = AnalysisOptions {
                segmentation: seg,
                pos,
                ner,
            };
            if config.nlp.show_analysis && options == AnalysisOptions::default() {
                options = AnalysisOptions::all();
            }
            let engine = build_engine(&config, store).await?;

            if question.is_empty() {
                let failed =
                    ask_lines(&engine, BufReader::new(tokio::io::stdin()), options, json).await?;
                if failed > 0 {
                    eprintln!("{} question(s) failed", failed);
                }
            } else {
                ask(&engine, &question.join(" "), options, json).await?;
            }
        }
        Command::Templates { action } => match action {
            TemplatesCommand::List => {
                for name in store.list().await? {
                    println!("{}", name);
                }
            }
            TemplatesCommand::Show { name } => {
                let template = store.load(&name).await?;
                println!("condition fields:");
                for field in &template.condition_fields {
                    println!("  {}", field.to_line());
                }
                println!("target fields:");
                for field in &template.target_fields {
                    println!("  {}", field.to_line());
                }
                println!("answers:");
                for answer in template.answer_patterns() {
                    println!("  {}", answer);
                }
                println!("questions:");
                for question in template.question_patterns() {
                    println!("  {}", question);
                }
            }
            TemplatesCommand::Build {
                name,
                conditions,
                targets,
                sentences,
            } => {
                let read = |path: String| async move {
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("failed to read {}", path))
                };
                let draft = TemplateDraft::from_text(
                    &read(conditions).await?,
                    &read(targets).await?,
                    &read(sentences).await?,
                )?;
                let path = store.build(&name, &draft).await?;
                println!(
                    "template {} built with {} question/answer pairs at {}",
                    name,
                    draft.question_lines.len(),
                    path.display()
                );
            }
        },
        Command::Values {
            table,
            column,
            filters,
        } => {
            let table: TableKind = table.parse()?;
            let bridge =
                SqliteBridge::connect(&config.database.url, config.database.max_connections)
                    .await?;
            let catalog = ValueCatalog::new(Arc::new(bridge));
            let filters: Vec<(&str, &str)> = filters
                .iter()
                .map(|(c, v)| (c.as_str(), v.as_str()))
                .collect();

            match catalog.distinct(table, &column, &filters).await? {
                Some(values) => {
                    for value in values {
                        println!("{}", value);
                    }
                }
                None => println!("无此项数据 ({} has no {} column)", table, column),
            }
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}

async fn build_engine(config: &QaConfig, store: Arc<TemplateStore>) -> Result<QaEngine> {
    let mut tagger = LexiconTagger::from_vocabulary(&SlotVocabulary::admissions());
    if let Some(lexicon) = &config.nlp.lexicon {
        tagger = tagger.load_lexicon(lexicon).await?;
    }

    let bridge = Arc::new(
        SqliteBridge::connect(&config.database.url, config.database.max_connections).await?,
    );
    let mut engine = QaEngine::new(Arc::new(tagger), store, bridge.clone());
    if config.database.canonicalize {
        engine = engine.with_catalog(Arc::new(ValueCatalog::new(bridge)));
    }
    Ok(engine)
}

/// Answers one question per non-empty line; a failed question is reported and skipped.
///
/// Returns the number of failed questions.
async fn ask_lines<R>(engine: &QaEngine, reader: R, options: AnalysisOptions, json: bool) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut failed = 0;
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = ask(engine, &line, options, json).await {
            tracing::error!(question = %line, "question failed: {:#}", e);
            eprintln!("error: {:#}", e);
            failed += 1;
        }
    }
    Ok(failed)
}

async fn ask(engine: &QaEngine, question: &str, options: AnalysisOptions, json: bool) -> Result<()> {
    let answer = engine.ask(question, options).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print!("{}", answer.to_text());
    }
    Ok(())
}

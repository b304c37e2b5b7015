//! kairos - command-line front end for the behavioral-consciousness engine.
//!
//! Runs against the bundled SQLite backend.
//!
//! # Environment Variables
//!
//! - `KAIROS_DB_PATH` - SQLite database (default: `~/.kairos/kairos.db`)
//! - `KAIROS_LLM_PROVIDER` - `anthropic`, `openai` or `none`
//! - `ANTHROPIC_API_KEY` / `OPENAI_API_KEY` - provider credentials
//! - `RUST_LOG` - log filter, logs go to stderr

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kairos_core::{
    Collaborators, ConsciousnessEngine, EngineConfig, Event, EventKind, FactsStore, KairosError,
    LlmProvider, MemoryEntry, SqliteStore, UserProfile,
};
use kairos_llm::LlmFactory;

#[derive(Parser, Debug)]
#[command(name = "kairos", version, about = "Behavioral-consciousness engine")]
struct Cli {
    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (toml, json or yaml). Falls back to environment variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip LLM theme extraction
    #[arg(long, global = true, default_value_t = false)]
    no_llm: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append events from a JSON-lines file
    Ingest {
        /// One event object per line
        file: PathBuf,
    },
    /// Create or update a user profile
    Profile {
        user: String,
        /// Account creation time, RFC 3339 (default: now)
        #[arg(long)]
        created_at: Option<DateTime<Utc>>,
        #[arg(long, default_value_t = false)]
        discovery_completed: bool,
        /// Identity JSON passed through to snapshots
        #[arg(long)]
        identity: Option<String>,
    },
    /// Record a long-term memory
    Remember {
        user: String,
        text: String,
        #[arg(long, default_value_t = 3)]
        importance: u8,
    },
    /// Print the consciousness snapshot
    Snapshot { user: String },
    /// Evaluate and commit a phase transition
    Transition { user: String },
    /// Print the stored facts document
    Facts { user: String },
}

/// One line of an ingest file. `id` is generated when absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestRecord {
    #[serde(default)]
    id: Option<String>,
    user_id: String,
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(default)]
    payload: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl IngestRecord {
    fn into_event(self) -> Event {
        let mut event = Event::new(self.user_id, self.kind, self.payload, self.timestamp);
        if let Some(id) = self.id {
            event.id = id;
        }
        event
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::from_env()?,
    };
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    if cli.no_llm {
        config.llm.provider = LlmProvider::None;
    }
    Ok(config)
}

fn build_engine(config: EngineConfig, store: Arc<SqliteStore>) -> Result<ConsciousnessEngine> {
    let theme_extractor = match LlmFactory::theme_extractor(&config.llm) {
        Ok(extractor) => extractor,
        Err(e) => {
            warn!(error = %e, "LLM unavailable, themes will use the lexical fallback");
            None
        }
    };

    let collaborators = Collaborators {
        event_log: store.clone(),
        facts: store.clone(),
        profiles: store.clone(),
        memory: store,
        theme_extractor,
    };
    Ok(ConsciousnessEngine::new(config, collaborators)?)
}

fn ingest(store: &SqliteStore, path: &Path) -> Result<()> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut inserted = 0usize;
    let mut skipped = 0usize;

    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: IngestRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid event", path.display(), lineno + 1))?;
        if store.append_event(&record.into_event())? {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    info!(inserted, skipped, "Ingest complete");
    println!("{} inserted, {} duplicates skipped", inserted, skipped);
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolution hint for a failed command, when the cause is a `KairosError`.
fn hint(err: &anyhow::Error) -> Option<&str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<KairosError>())
        .and_then(KairosError::suggestion)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kairos_core=debug")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        if let Some(suggestion) = hint(&e) {
            error!(error = %e, suggestion, "Command failed");
            eprintln!("hint: {}", suggestion);
        }
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let store = Arc::new(
        SqliteStore::open(&config.database_path)
            .with_context(|| format!("opening {}", config.database_path.display()))?,
    );

    match cli.command {
        Command::Ingest { file } => ingest(&store, &file)?,
        Command::Profile {
            user,
            created_at,
            discovery_completed,
            identity,
        } => {
            let identity = identity
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .context("--identity must be valid JSON")?
                .unwrap_or(serde_json::Value::Null);
            let profile = UserProfile::new(user, created_at.unwrap_or_else(Utc::now))
                .with_discovery_completed(discovery_completed)
                .with_identity(identity);
            store.upsert_profile(&profile)?;
            print_json(&profile)?;
        }
        Command::Remember {
            user,
            text,
            importance,
        } => {
            store.add_memory(&user, &MemoryEntry::new(text, importance, Utc::now()))?;
            println!("remembered");
        }
        Command::Snapshot { user } => {
            let engine = build_engine(config, store)?;
            print_json(&engine.build_snapshot(&user).await?)?;
        }
        Command::Transition { user } => {
            let engine = build_engine(config, store)?;
            print_json(&engine.evaluate_and_commit_transition(&user).await?)?;
        }
        Command::Facts { user } => {
            print_json(&store.get_facts(&user).await?)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairos_core::{EventLog, EventPayload};
    use std::io::Write;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["kairos", "snapshot", "u1", "--no-llm", "--db", "x.db"])
            .unwrap();
        assert!(cli.no_llm);
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert!(matches!(cli.command, Command::Snapshot { ref user } if user == "u1"));
    }

    #[test]
    fn test_ingest_record_generates_missing_id() {
        let record: IngestRecord = serde_json::from_str(
            r#"{"userId":"u1","type":"habit_tick","payload":{"completed":true},"timestamp":"2026-03-01T07:00:00Z"}"#,
        )
        .unwrap();
        let event = record.into_event();
        assert!(!event.id.is_empty());
        assert_eq!(event.kind, EventKind::HabitTick);
        assert_eq!(
            event.payload(),
            EventPayload::Habit {
                habit_id: None,
                completed: true
            }
        );
    }

    #[test]
    fn test_hint_for_invalid_window() {
        let config = EngineConfig {
            window_days: 1_000_000,
            ..Default::default()
        };
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let err = build_engine(config, store).err().unwrap();
        assert_eq!(hint(&err), Some("Use the default of 30 days"));

        let plain = anyhow::anyhow!("unrelated");
        assert_eq!(hint(&plain), None);
    }

    #[tokio::test]
    async fn test_ingest_skips_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut file = fs::File::create(&path).unwrap();
        let line = r#"{"id":"e1","userId":"u1","type":"debrief","payload":{"text":"ok"},"timestamp":"2026-03-01T07:00:00Z"}"#;
        writeln!(file, "{}", line).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{}", line).unwrap();

        let store = SqliteStore::in_memory().unwrap();
        ingest(&store, &path).unwrap();

        let since = "2026-01-01T00:00:00Z".parse().unwrap();
        let events = store.fetch_events("u1", since, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload(), EventPayload::Text { text: "ok" });
    }
}

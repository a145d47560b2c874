use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use budgnudg_categorize::{CategorizerConfig, RuleTables};
use budgnudg_core::{KeywordRule, LearningKind, Money};
use budgnudg_storage::ImportMode;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{AppState, SaveOptions};

#[derive(Parser, Debug)]
#[command(name = "budgnudg", version, about = "Transaction categorization with learned merchant patterns")]
struct Cli {
    /// SQLite database (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML file with extra or replacement categorization tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Categorize a transaction description and show the reasoning
    Categorize {
        description: String,

        /// Signed amount, e.g. -5.75
        #[arg(long, allow_hyphen_values = true, default_value = "0")]
        amount: String,

        /// Store the transaction with its resolved entities
        #[arg(long)]
        save: bool,

        /// Transaction date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Context prefix for stored error codes
        #[arg(long, default_value = "AI")]
        prefix: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Look up a category or payoree by name
    Lookup {
        #[arg(value_enum)]
        target: LookupKind,

        name: String,

        #[arg(long, default_value = "USER")]
        prefix: String,
    },

    /// Confirm a stored transaction's categorization and learn from it
    Confirm {
        id: i64,

        /// Confirmed subcategory name (keeps the stored one if omitted)
        #[arg(long)]
        subcategory: Option<String>,

        /// Confirmed payoree name (keeps the stored one if omitted)
        #[arg(long)]
        payoree: Option<String>,

        /// Confirmation date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Count stored transactions by categorization error code
    Errors,

    /// Show the strongest learned merchant patterns
    Patterns {
        #[arg(long, value_enum, default_value = "subcategory")]
        kind: PatternKind,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Write learned patterns and keyword rules as JSON
    ExportLearning {
        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Load a learning backup
    ImportLearning {
        path: PathBuf,

        /// Clear learned data and keyword rules before importing
        #[arg(long)]
        replace: bool,
    },

    /// Import categories from a CSV with Category and SubCategory columns
    ImportCategories { path: PathBuf },

    /// Import payorees from a CSV with a Name column
    ImportPayorees { path: PathBuf },

    /// Add a keyword rule that overrides every other suggestion
    AddKeywordRule {
        keyword: String,

        #[arg(long)]
        category: String,

        #[arg(long)]
        subcategory: Option<String>,

        #[arg(long)]
        payoree: Option<String>,

        #[arg(long, default_value_t = 100)]
        priority: i32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LookupKind {
    Category,
    Payoree,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PatternKind {
    Subcategory,
    Payoree,
}

impl From<PatternKind> for LearningKind {
    fn from(kind: PatternKind) -> Self {
        match kind {
            PatternKind::Subcategory => LearningKind::Subcategory,
            PatternKind::Payoree => LearningKind::Payoree,
        }
    }
}

fn default_db_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("com", "budgnudg", "Budgnudg")
        .context("could not determine a data directory")?;
    let data_dir = project_dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;
    Ok(data_dir.join("budgnudg.db"))
}

fn load_tables(config: Option<&Path>) -> Result<RuleTables> {
    match config {
        Some(path) => {
            let config = CategorizerConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            Ok(RuleTables::from_config(config))
        }
        None => Ok(RuleTables::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    let db = budgnudg_storage::create_db(&db_path)
        .await
        .with_context(|| format!("opening {}", db_path.display()))?;
    let state = AppState {
        db,
        tables: load_tables(cli.config.as_deref())?,
    };
    let today = Local::now().date_naive();

    match cli.command {
        Command::Categorize {
            description,
            amount,
            save,
            date,
            prefix,
            json,
        } => {
            let amount: Money = amount
                .parse()
                .with_context(|| format!("invalid amount '{amount}'"))?;
            let save = save.then(|| SaveOptions {
                date: date.unwrap_or(today),
                prefix: &prefix,
            });
            let out = state.categorize(&description, amount, save).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("Category:    {}", out.decision.category);
                println!("Subcategory: {}", out.decision.subcategory);
                if let Some(payoree) = &out.decision.payoree {
                    println!("Payoree:     {payoree}");
                }
                println!("Merchant:    {}", out.decision.merchant_key);
                println!("Reasoning:   {}", out.decision.reasoning);
                println!(
                    "Confidence:  {:.1}% ({}, {} confirmations)",
                    out.confidence.overall_confidence,
                    out.confidence.source,
                    out.confidence.learning_count
                );
                if let Some(id) = out.transaction_id {
                    match &out.categorization_error {
                        Some(code) => println!("Saved transaction {id} with error {code}"),
                        None => println!("Saved transaction {id}"),
                    }
                }
            }
        }

        Command::Lookup {
            target,
            name,
            prefix,
        } => {
            let out = match target {
                LookupKind::Category => state.lookup_category(&name, &prefix).await?,
                LookupKind::Payoree => state.lookup_payoree(&name, &prefix).await?,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Command::Confirm {
            id,
            subcategory,
            payoree,
            date,
        } => {
            let outcome = state
                .confirm(
                    id,
                    subcategory.as_deref(),
                    payoree.as_deref(),
                    date.unwrap_or(today),
                )
                .await?;
            println!(
                "Confirmed transaction {id} (subcategory seen {} times, payoree seen {} times)",
                outcome.subcategory_count, outcome.payoree_count
            );
        }

        Command::Errors => {
            let breakdown = state.error_breakdown().await?;
            if breakdown.is_empty() {
                println!("No categorization errors");
            }
            for (code, count) in breakdown {
                println!("{count:>6}  {code}");
            }
        }

        Command::Patterns { kind, limit } => {
            for p in state.patterns(kind.into(), limit).await? {
                let target = match &p.parent {
                    Some(parent) => format!("{parent} / {}", p.target),
                    None => p.target.clone(),
                };
                println!(
                    "{:>4}  {:<30} {target}  (last {})",
                    p.confirmation_count, p.merchant_key, p.last_confirmed
                );
            }
        }

        Command::ExportLearning { out } => {
            state.export_learning(out.as_deref()).await?;
        }

        Command::ImportLearning { path, replace } => {
            let mode = if replace {
                ImportMode::Replace
            } else {
                ImportMode::Merge
            };
            state.import_learning(&path, mode).await?;
        }

        Command::ImportCategories { path } => {
            let counts = state.import_categories(&path).await?;
            println!(
                "{} rows, {} new subcategories, {} skipped",
                counts.rows, counts.created, counts.skipped
            );
        }

        Command::ImportPayorees { path } => {
            let counts = state.import_payorees(&path).await?;
            println!(
                "{} rows, {} new payorees, {} skipped",
                counts.rows, counts.created, counts.skipped
            );
        }

        Command::AddKeywordRule {
            keyword,
            category,
            subcategory,
            payoree,
            priority,
        } => {
            let mut rule = KeywordRule::new(&keyword, &category, priority);
            if let Some(subcategory) = subcategory.as_deref() {
                rule = rule.with_subcategory(subcategory);
            }
            if let Some(payoree) = payoree.as_deref() {
                rule = rule.with_payoree(payoree);
            }
            let id = state.add_keyword_rule(rule).await?;
            println!("Added keyword rule {id}");
        }
    }

    Ok(())
}

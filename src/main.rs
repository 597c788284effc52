use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;

use wizard_drafts::config::Config;
use wizard_drafts::drafts::DraftStore;
use wizard_drafts::logging;
use wizard_drafts::navigation::StepNavigator;
use wizard_drafts::session::{PublishError, PublishWorkflow, Submission, WizardSession};
use wizard_drafts::validation::WizardValidator;
use wizard_drafts::wizard::{BuiltinWizard, WizardConfig};

#[derive(Parser)]
#[command(name = "wizard")]
#[command(about = "Validate, save and publish multi-step wizard drafts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a payload against a wizard
    Validate {
        /// Wizard type (property, land, blog)
        wizard: String,

        /// JSON payload file, or - for stdin
        #[arg(long, default_value = "-")]
        data: String,

        /// Validate a single step instead of the whole wizard
        #[arg(short, long)]
        step: Option<String>,
    },

    /// Show per-step status and overall progress for a payload
    Progress {
        wizard: String,

        #[arg(long, default_value = "-")]
        data: String,
    },

    /// Save a payload as a draft and print its id
    Save {
        wizard: String,

        #[arg(short, long)]
        owner: String,

        #[arg(long, default_value = "-")]
        data: String,

        /// Existing draft to overwrite
        #[arg(long)]
        draft: Option<String>,

        /// Step the user is on
        #[arg(short, long)]
        step: Option<String>,
    },

    /// Inspect and manage saved drafts
    Drafts {
        #[command(subcommand)]
        action: DraftsAction,
    },

    /// Validate a saved draft and publish it as JSON on stdout
    Complete {
        wizard: String,

        #[arg(short, long)]
        owner: String,

        #[arg(long)]
        draft: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum DraftsAction {
    /// List an owner's drafts, newest first
    List {
        #[arg(short, long)]
        owner: String,

        /// Only drafts of this wizard type
        #[arg(short, long)]
        wizard: Option<String>,
    },

    /// Print a draft with its metadata
    Show {
        wizard: String,
        #[arg(short, long)]
        owner: String,
        draft: String,
    },

    /// Delete a draft
    Delete {
        wizard: String,
        #[arg(short, long)]
        owner: String,
        draft: String,
    },

    /// Remove expired and unreadable drafts
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    let result = match cli.command {
        Commands::Validate { wizard, data, step } => cmd_validate(&config, &wizard, &data, step),
        Commands::Progress { wizard, data } => cmd_progress(&config, &wizard, &data),
        Commands::Save {
            wizard,
            owner,
            data,
            draft,
            step,
        } => cmd_save(&config, &wizard, &owner, &data, draft, step),
        Commands::Drafts { action } => cmd_drafts(&config, action),
        Commands::Complete {
            wizard,
            owner,
            draft,
        } => cmd_complete(&config, &wizard, &owner, &draft).await,
        Commands::Config => cmd_config(&config),
    };

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            eprintln!("Log: {}", log_path.display());
        }
    }

    result
}

fn wizard_config(config: &Config, wizard_type: &str) -> Result<Arc<WizardConfig>> {
    match config.wizard(wizard_type) {
        Some(wizard) => Ok(wizard),
        None => {
            let known: Vec<&str> = BuiltinWizard::all().iter().map(|w| w.key()).collect();
            bail!(
                "Unknown wizard '{}' (available: {})",
                wizard_type,
                known.join(", ")
            )
        }
    }
}

fn read_payload(source: &str) -> Result<Value> {
    let contents = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read payload from {source}"))?
    };
    serde_json::from_str(&contents).context("Payload is not valid JSON")
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render output")?
    );
    Ok(())
}

fn cmd_validate(config: &Config, wizard_type: &str, data: &str, step: Option<String>) -> Result<()> {
    let wizard = wizard_config(config, wizard_type)?;
    let payload = read_payload(data)?;
    let validator = WizardValidator::new();

    let result = match step {
        Some(step_id) => {
            if wizard.step(&step_id).is_none() {
                bail!("Wizard '{}' has no step '{}'", wizard_type, step_id);
            }
            validator.validate_step(&step_id, &payload, wizard.schema_for(&step_id))
        }
        None => validator.validate_all_steps(&payload, &wizard),
    };

    print_json(&serde_json::json!({
        "valid": result.is_valid(),
        "canComplete": validator.can_complete(&payload, &wizard),
        "errors": result.errors,
        "warnings": result.warnings,
    }))
}

fn cmd_progress(config: &Config, wizard_type: &str, data: &str) -> Result<()> {
    let wizard = wizard_config(config, wizard_type)?;
    let payload = read_payload(data)?;

    let mut navigator = StepNavigator::new(Arc::clone(&wizard));
    let current = navigator.resume(&payload);

    for (index, (step, status)) in wizard.steps().iter().zip(navigator.statuses()).enumerate() {
        let marker = if index + 1 == current { ">" } else { " " };
        println!(
            "{marker} {}. {:<28} {}",
            index + 1,
            step.title,
            status.label()
        );
    }

    if wizard.navigation().show_progress {
        println!();
        println!("Progress: {:.0}%", navigator.get_overall_progress(&payload));
    }
    match navigator.get_next_incomplete_step(&payload) {
        Some(step) => println!("Next: {}", step.title),
        None => println!("Ready to publish"),
    }

    Ok(())
}

fn cmd_save(
    config: &Config,
    wizard_type: &str,
    owner: &str,
    data: &str,
    draft: Option<String>,
    step: Option<String>,
) -> Result<()> {
    let wizard = wizard_config(config, wizard_type)?;
    if let Some(step_id) = step.as_deref() {
        if wizard.step(step_id).is_none() {
            bail!("Wizard '{}' has no step '{}'", wizard_type, step_id);
        }
    }
    let payload = read_payload(data)?;
    let store = config.draft_store_for(&wizard)?;

    let id = store
        .save(wizard_type, owner, &payload, draft.as_deref(), step.as_deref())
        .context("Draft storage is unavailable")?;
    println!("{id}");
    Ok(())
}

fn cmd_drafts(config: &Config, action: DraftsAction) -> Result<()> {
    let store = config.draft_store()?;

    match action {
        DraftsAction::List { owner, wizard } => {
            let drafts = store.list_drafts(&owner, wizard.as_deref());
            if drafts.is_empty() {
                println!("No drafts");
                return Ok(());
            }
            for draft in drafts {
                println!(
                    "{}  {:<9} {:<12} updated {}  expires {}",
                    draft.id,
                    draft.wizard_type,
                    draft.current_step_id.as_deref().unwrap_or("-"),
                    draft.updated_at.format("%Y-%m-%d %H:%M"),
                    draft.expires_at.format("%Y-%m-%d %H:%M"),
                );
            }
        }
        DraftsAction::Show {
            wizard,
            owner,
            draft,
        } => {
            let Some(found) = store.load_draft(&wizard, &owner, &draft) else {
                bail!("Draft '{}' not found", draft);
            };
            print_json(&found)?;
        }
        DraftsAction::Delete {
            wizard,
            owner,
            draft,
        } => {
            if !store.delete(&wizard, &owner, &draft) {
                bail!("Failed to delete draft '{}'", draft);
            }
            println!("Deleted {draft}");
        }
        DraftsAction::Sweep => {
            let removed = store.clear_expired_drafts();
            println!("Removed {removed} expired draft(s)");
        }
    }

    Ok(())
}

/// Publishes by writing the submission to stdout
struct StdoutPublisher;

#[async_trait]
impl PublishWorkflow for StdoutPublisher {
    async fn publish(&self, submission: Submission) -> Result<String, PublishError> {
        let rendered = serde_json::to_string_pretty(&submission)
            .map_err(|e| PublishError::Rejected(e.to_string()))?;
        println!("{rendered}");
        Ok(submission.draft_id)
    }
}

async fn cmd_complete(config: &Config, wizard_type: &str, owner: &str, draft: &str) -> Result<()> {
    let wizard = wizard_config(config, wizard_type)?;
    let store: Arc<DraftStore> = Arc::new(config.draft_store_for(&wizard)?);

    let Some(session) = WizardSession::resume(wizard, owner, draft, store) else {
        bail!("Draft '{}' not found", draft);
    };

    match session.complete(&StdoutPublisher).await {
        Ok(_) => Ok(()),
        Err(PublishError::Incomplete(result)) => {
            for (field, message) in &result.errors {
                eprintln!("  {field}: {message}");
            }
            bail!("Draft '{}' is not ready to publish", draft)
        }
        Err(e) => Err(e).context("Publish failed"),
    }
}

fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

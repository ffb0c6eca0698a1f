//! Doorstep CLI: runs the intake wizard on a terminal, manages saved
//! drafts, and previews form schemas.

use std::io::{self, BufRead, Write as _};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};

use doorstep_engine::{
    HttpSubmissionGateway, StepOutcome, SubmissionGateway, SubmitOutcome, WizardController, parse_form_file,
};
use doorstep_types::catalog::{donation_form, volunteer_form};
use doorstep_types::{FieldDefinition, FieldKind, FormSchema};
use doorstep_util::{DraftKey, DraftStore, JsonDraftStore, normalize_phone};

#[derive(Parser)]
#[command(name = "doorstep", about = "Donation intake wizard", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an intake wizard interactively.
    Run(RunArgs),
    /// Inspect or remove saved drafts.
    Drafts {
        #[command(subcommand)]
        action: DraftsAction,
    },
    /// Print a form schema as pretty JSON.
    Forms(FormsArgs),
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    source: FormSource,
    /// Base URL of the intake API; when omitted the payload is printed
    /// instead of submitted.
    #[arg(long)]
    submit_url: Option<String>,
    /// Print the payload that would be submitted and exit.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct FormSource {
    /// Built-in form to run: `donation` or `volunteer`.
    #[arg(long, default_value = "donation")]
    form: String,
    /// Load the schema from a YAML/JSON form file instead.
    #[arg(long)]
    file: Option<String>,
    /// Form name inside a multi-form file.
    #[arg(long)]
    name: Option<String>,
}

#[derive(Subcommand)]
enum DraftsAction {
    /// List saved drafts with their last-write time.
    List,
    /// Remove the draft for a form kind.
    Clear {
        /// Draft key, for example `donation-form`.
        key: String,
    },
}

#[derive(Args)]
struct FormsArgs {
    #[command(flatten)]
    source: FormSource,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run_wizard(args).await,
        Command::Drafts { action } => run_drafts(action),
        Command::Forms(args) => {
            let schema = resolve_schema(&args.source)?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn resolve_schema(source: &FormSource) -> Result<FormSchema> {
    if let Some(file) = &source.file {
        let bundle = parse_form_file(file)?;
        return match &source.name {
            Some(name) => bundle
                .forms
                .get(name)
                .cloned()
                .with_context(|| format!("form '{}' not found in {}", name, file)),
            None if bundle.forms.len() == 1 => bundle
                .forms
                .into_values()
                .next()
                .with_context(|| format!("{} holds no forms", file)),
            None => bail!("{} holds several forms; pick one with --name", file),
        };
    }

    match source.form.as_str() {
        "donation" => Ok(donation_form()),
        "volunteer" => Ok(volunteer_form()),
        other => bail!("unknown built-in form '{}'; expected donation or volunteer", other),
    }
}

fn run_drafts(action: DraftsAction) -> Result<()> {
    let store = JsonDraftStore::with_defaults();
    match action {
        DraftsAction::List => {
            let summaries = store.summaries();
            if summaries.is_empty() {
                println!("No saved drafts.");
            }
            for summary in summaries {
                println!("{}\t{}", summary.key, summary.updated_at.to_rfc3339());
            }
        }
        DraftsAction::Clear { key } => {
            store.clear(&DraftKey::new(key.clone()));
            println!("Cleared draft '{}'.", key);
        }
    }
    Ok(())
}

async fn run_wizard(args: RunArgs) -> Result<()> {
    let schema = resolve_schema(&args.source)?;
    let store: Arc<dyn DraftStore> = Arc::new(JsonDraftStore::with_defaults());
    let mut wizard = WizardController::new(schema, store)?;

    if !wizard.record().is_empty() {
        println!("Restored a saved draft; press Enter on any field to keep its value.\n");
    }
    if let Some(title) = &wizard.schema().title {
        println!("== {} ==\n", title);
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let step = wizard.step().clone();
        println!("-- Step {}: {} --", wizard.current_step() + 1, step.title);

        let fields: Vec<String> = wizard
            .schema()
            .active_step_fields(wizard.current_step(), wizard.record())
            .into_iter()
            .map(str::to_string)
            .collect();
        for field in &fields {
            prompt_field(&mut wizard, field, &mut lines)?;
        }

        match wizard.next() {
            StepOutcome::Advanced(_) => println!(),
            StepOutcome::ReadyToSubmit => break,
            StepOutcome::Rejected(report) => {
                println!("\nPlease fix the following before continuing:");
                for (field, message) in report.entries() {
                    let label = wizard.schema().fields.get(field).map(|f| f.label.as_str()).unwrap_or(field);
                    println!("  {}: {}", label, message);
                }
                println!();
            }
            StepOutcome::MovedBack(_) | StepOutcome::Ignored => {}
        }
    }

    let payload = wizard.submission_payload();
    match args.submit_url {
        Some(url) if !args.dry_run => {
            let gateway = HttpSubmissionGateway::new(url);
            submit_with_retry(&mut wizard, &gateway, &mut lines).await
        }
        maybe_url => {
            if maybe_url.is_none() && !args.dry_run {
                println!("No --submit-url configured; printing the payload instead.");
            }
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
    }
}

/// Submits the finished record, offering a retry prompt on failure. The
/// wizard keeps the record and its draft across failed attempts.
async fn submit_with_retry(
    wizard: &mut WizardController,
    gateway: &dyn SubmissionGateway,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<()> {
    loop {
        println!("Submitting…");
        match wizard.submit(gateway).await? {
            SubmitOutcome::Submitted(receipt) => {
                println!("Thank you! Your reference id is {}.", receipt.id);
                return Ok(());
            }
            SubmitOutcome::Failed(error) => {
                println!("Submission failed: {}", error);
                print!("Retry? [y/N] ");
                io::stdout().flush()?;
                let answer = lines.next().transpose()?.unwrap_or_default();
                if !answer.trim().eq_ignore_ascii_case("y") {
                    println!("Your answers are saved as a draft; run again to retry.");
                    return Ok(());
                }
            }
            SubmitOutcome::Rejected(report) => {
                for (field, message) in report.entries() {
                    println!("  {}: {}", field, message);
                }
                bail!("record failed final validation");
            }
            SubmitOutcome::Ignored => return Ok(()),
        }
    }
}

fn prompt_field(
    wizard: &mut WizardController,
    field: &str,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<()> {
    let definition = wizard
        .schema()
        .fields
        .get(field)
        .cloned()
        .with_context(|| format!("field '{}' missing from schema", field))?;

    if definition.kind == FieldKind::Items {
        return prompt_items(wizard, field, &definition, lines);
    }

    let current = wizard.record().get(field).cloned();
    print!("{}", definition.label);
    if !definition.validate.allowed_values.is_empty() {
        let options: Vec<String> = definition.validate.allowed_values.iter().map(render_option).collect();
        print!(" ({})", options.join("/"));
    }
    if let Some(placeholder) = &definition.placeholder {
        print!(" [{}]", placeholder);
    }
    if let Some(value) = &current {
        print!(" [current: {}]", render_option(value));
    }
    print!(": ");
    io::stdout().flush()?;

    let input = lines.next().transpose()?.unwrap_or_default();
    let trimmed = input.trim();
    if trimmed.is_empty() {
        // Keep the current (possibly drafted) value.
        return Ok(());
    }

    let value = match definition.kind {
        FieldKind::Phone => json!(normalize_phone(trimmed)),
        _ => json!(trimmed),
    };
    wizard.set_field(field, value)?;
    Ok(())
}

fn prompt_items(
    wizard: &mut WizardController,
    field: &str,
    definition: &FieldDefinition,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<()> {
    println!("{} — enter `category quantity` per line, blank line to finish:", definition.label);
    let mut items = Vec::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let input = lines.next().transpose()?.unwrap_or_default();
        let trimmed = input.trim();
        if trimmed.is_empty() {
            break;
        }
        let mut parts = trimmed.rsplitn(2, char::is_whitespace);
        let quantity = parts.next().and_then(|raw| raw.parse::<u64>().ok());
        let category = parts.next().map(str::trim).unwrap_or_default();
        match quantity {
            Some(quantity) if !category.is_empty() => {
                items.push(json!({"category": category, "quantity": quantity}));
            }
            _ => println!("  Could not read that; try e.g. `jacket 2`."),
        }
    }

    if !items.is_empty() {
        wizard.set_field(field, Value::Array(items))?;
    }
    Ok(())
}

fn render_option(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

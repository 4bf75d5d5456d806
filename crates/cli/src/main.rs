use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use provdesc_engine::{CallContext, DescriptionSet, ResolverConfig, parse_description_file};
use tracing::debug;

/// Validate provenance descriptions and resolve them against recorded calls.
#[derive(Parser, Debug)]
#[command(name = "provdesc", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a description document and report what it declares
    Validate {
        /// Description document (YAML or JSON)
        file: PathBuf,
    },
    /// Print one activity description
    Show {
        /// Description document (YAML or JSON)
        file: PathBuf,
        /// Activity name
        activity: String,
    },
    /// Resolve an activity against a call context and print the record as JSON
    Resolve {
        /// Description document (YAML or JSON)
        file: PathBuf,
        /// Activity name
        activity: String,
        /// Call context as JSON; an empty context when omitted
        #[arg(long)]
        context: Option<PathBuf>,
        /// Resolver configuration; defaults to PROVDESC_CONFIG_PATH or the user config dir
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let Cli { command } = Cli::parse();

    match command {
        Command::Validate { file } => {
            let descriptions = parse_description_file(&file)?;
            println!("{}", summary(&file, &descriptions));
            for diagnostic in descriptions.diagnostics() {
                println!("  warning: {diagnostic}");
            }
        }
        Command::Show { file, activity } => {
            let descriptions = parse_description_file(&file)?;
            let description = descriptions
                .activity(&activity)
                .with_context(|| format!("no activity '{activity}' in {}", file.display()))?;
            print!("{}", serde_yaml::to_string(description)?);
        }
        Command::Resolve {
            file,
            activity,
            context,
            config,
        } => {
            let descriptions = parse_description_file(&file)?;
            let config = match config {
                Some(path) => ResolverConfig::load_from_path(&path)?,
                None => ResolverConfig::load()?,
            };
            let context = match context {
                Some(path) => load_context(&path)?,
                None => CallContext::new(),
            };
            debug!(activity = %activity, ?config, "resolving activity");
            let record = descriptions.resolver(&config).resolve_call(&activity, &context)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn summary(file: &Path, descriptions: &DescriptionSet) -> String {
    let roles: usize = descriptions
        .activities()
        .values()
        .map(|activity| activity.usage.len() + activity.generation.len())
        .sum();
    format!(
        "{}: {} activities ({} roles), {} entity descriptions, {} namespaces, {} agents",
        file.display(),
        descriptions.activities().len(),
        roles,
        descriptions.entities().len(),
        descriptions.namespaces().len(),
        descriptions.agents().len()
    )
}

fn load_context(path: &Path) -> Result<CallContext> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read call context: {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("Call context is not valid JSON: {}", path.display()))?;
    CallContext::from_json(value).with_context(|| format!("Invalid call context: {}", path.display()))
}

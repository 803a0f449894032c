use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use super::plan::describe;
use super::{load_document, read_intent};

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// SCL file
    pub file: PathBuf,

    /// Intent JSON file, `-` for stdin
    pub intent: PathBuf,

    /// Write the result here instead of changing the file in place
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn apply(args: ApplyArgs, config: &Config) -> Result<()> {
    let mut doc = load_document(&args.file, config)?;
    let intent = read_intent(&args.intent, config)?;

    let actions = doc.plan(&intent)?;
    for action in &actions {
        println!("  {}", describe(doc.tree(), action));
    }
    doc.apply(&actions)?;

    match &args.output {
        Some(output) => {
            std::fs::write(output, doc.source())
                .with_context(|| format!("Cannot write {}", output.display()))?;
            info!(output = %output.display(), "written");
        }
        None => {
            if config.backup {
                let mut backup = args.file.clone().into_os_string();
                backup.push(".bak");
                std::fs::copy(&args.file, &backup)
                    .with_context(|| format!("Cannot back up {}", args.file.display()))?;
            }
            doc.save()?;
        }
    }

    println!(
        "{} {} with {} actions",
        "✓".green(),
        intent.name(),
        actions.len()
    );
    Ok(())
}

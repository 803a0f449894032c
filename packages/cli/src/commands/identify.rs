use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use scl_editor::Selector;
use std::path::PathBuf;

use super::load_document;

#[derive(Debug, Args)]
pub struct IdentifyArgs {
    /// SCL file
    pub file: PathBuf,

    /// Only list elements with this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

pub fn identify(args: IdentifyArgs, config: &Config) -> Result<()> {
    let doc = load_document(&args.file, config)?;

    let selectors: Vec<Selector> = doc
        .tree()
        .elements()
        .filter(|element| {
            args.tag
                .as_deref()
                .map_or(true, |tag| element.has_tag(tag))
        })
        .filter_map(Selector::of)
        .collect();

    for selector in &selectors {
        println!("{}: {}", selector.tag.bright_blue(), selector.identity);
    }
    if selectors.is_empty() {
        println!("{}", "No matching elements".yellow());
    }
    Ok(())
}

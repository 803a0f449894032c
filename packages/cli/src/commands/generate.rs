use crate::config::Config;
use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use scl_editor::generators::{AppIdGenerator, MacAddressGenerator};
use scl_editor::scl::CommunicationKind;
use std::path::PathBuf;
use tracing::warn;

use super::load_document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Gse,
    Smv,
}

impl From<Kind> for CommunicationKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Gse => CommunicationKind::Gse,
            Kind::Smv => CommunicationKind::Smv,
        }
    }
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// SCL file
    pub file: PathBuf,

    /// Communication the values are for
    #[arg(short, long, value_enum, default_value = "gse")]
    pub kind: Kind,

    /// Generate APPIDs instead of MAC addresses
    #[arg(long)]
    pub appid: bool,

    /// Use the trip GOOSE APPID range
    #[arg(long)]
    pub type1a: bool,

    /// Number of values
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,
}

pub fn generate(args: GenerateArgs, config: &Config) -> Result<()> {
    let doc = load_document(&args.file, config)?;
    let kind = CommunicationKind::from(args.kind);

    let values: Vec<String> = if args.appid {
        AppIdGenerator::new(doc.tree(), kind, args.type1a)
            .take(args.count)
            .collect()
    } else {
        MacAddressGenerator::new(doc.tree(), kind)
            .take(args.count)
            .collect()
    };

    for value in &values {
        println!("{}", value);
    }
    if values.len() < args.count {
        warn!(requested = args.count, generated = values.len(), "range exhausted");
        eprintln!(
            "{} only {} of {} values available",
            "Warning:".yellow().bold(),
            values.len(),
            args.count
        );
    }
    Ok(())
}

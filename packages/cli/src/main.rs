mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    apply, generate, identify, plan, ApplyArgs, GenerateArgs, IdentifyArgs, PlanArgs,
};
use config::Config;
use tracing_subscriber::EnvFilter;

/// SCL CLI - consistent edits of IEC 61850 substation configurations
#[derive(Parser, Debug)]
#[command(name = "scl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List element selectors
    Identify(IdentifyArgs),

    /// Print the actions an intent would apply
    Plan(PlanArgs),

    /// Apply an intent and write the result
    Apply(ApplyArgs),

    /// Print unused MAC addresses or APPIDs
    Generate(GenerateArgs),
}

fn init_tracing(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = Config::load(&cwd)?;
    init_tracing(&config, cli.verbose);

    match cli.command {
        Command::Identify(args) => identify(args, &config),
        Command::Plan(args) => plan(args, &config),
        Command::Apply(args) => apply(args, &config),
        Command::Generate(args) => generate(args, &config),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}

pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "hourcast",
    about = "Hourcast effort-estimation CLI",
    long_about = "Estimate effort from a description or tracker ticket, record actual hours, \
and inspect estimation accuracy.",
    after_help = "Examples:\n  hourcast estimate --description \"Create a login form\"\n  \
hourcast estimate --ticket PROJ-123 --exclude-phase requirements\n  \
hourcast actual PROJ-123 36.5\n  hourcast stats"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Estimate effort for a description and/or tracker ticket")]
    Estimate {
        #[arg(long, help = "Free-text task description")]
        description: Option<String>,
        #[arg(long, help = "Tracker ticket key, e.g. PROJ-123")]
        ticket: Option<String>,
        #[arg(long, help = "Skip the model gateway and use rule-based estimation")]
        no_model: bool,
        #[arg(
            long = "exclude-phase",
            value_name = "PHASE",
            help = "Exclude a phase from the remaining-work estimate (repeatable)"
        )]
        exclude_phase: Vec<String>,
        #[arg(
            long = "phase-weight",
            value_name = "NAME=PERCENT",
            help = "Override a phase weight or add a custom phase (repeatable)"
        )]
        phase_weight: Vec<String>,
    },
    #[command(about = "Record actual hours for a previously estimated ticket")]
    Actual {
        #[arg(help = "Tracker ticket key")]
        ticket: String,
        #[arg(help = "Actual hours spent")]
        hours: String,
    },
    #[command(about = "Show estimation accuracy statistics")]
    Stats,
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "Validate config, gateway/tracker readiness, and history-store access")]
    Doctor,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Estimate { description, ticket, no_model, exclude_phase, phase_weight } => {
            commands::estimate::run(commands::estimate::EstimateArgs {
                description,
                ticket,
                no_model,
                exclude_phases: exclude_phase,
                phase_weights: phase_weight,
            })
        }
        Command::Actual { ticket, hours } => commands::actual::run(&ticket, &hours),
        Command::Stats => commands::stats::run(),
        Command::Config => commands::config::run(),
        Command::Doctor => commands::doctor::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

//! `leaveplan` CLI: paid holidays, long weekends and off-day calendars from a
//! JSON plan document.
//!
//! ## Usage
//!
//! ```sh
//! # Paid holidays per person (stdin → stdout)
//! leaveplan paid-holidays < plan.json
//!
//! # Long weekends bridging single work-days, at least 3 days long
//! leaveplan long-weekends -i plan.json --tolerance 1 --min-count 3
//!
//! # Write the report to a file, with progress logged to stderr
//! leaveplan -v long-weekends -i plan.json -o report.json
//!
//! # Every off-day of one person's cycle
//! leaveplan calendar -i plan.json --person asha
//!
//! # Check a plan document without planning
//! leaveplan validate -i plan.json
//! ```

mod logging;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use leave_engine::{OffReason, PlanConfig, PlanError, Planner};
use serde::Serialize;
use std::io::{self, Read};
use std::process;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "leaveplan",
    version,
    about = "Plan long weekends and leave usage over a fiscal year"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count paid holidays per person and their share of the cycle
    PaidHolidays {
        /// Plan document (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Find long weekends and fill their gaps with leave
    LongWeekends {
        /// Plan document (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Longest run of work-days a block may bridge
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        tolerance: i64,
        /// Shortest block length reported, in days
        #[arg(long, default_value_t = 3, allow_negative_numbers = true)]
        min_count: i64,
    },
    /// List every off-day of one person's cycle
    Calendar {
        /// Plan document (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Person whose calendar is listed
        #[arg(long)]
        person: String,
    },
    /// Validate a plan document
    Validate {
        /// Plan document (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::PaidHolidays { input, output } => {
            let planner = load_planner(input.as_deref())?;
            let report = planner.verbose_paid_holidays();
            write_output(output.as_deref(), &to_json(&report)?)?;
        }
        Commands::LongWeekends {
            input,
            output,
            tolerance,
            min_count,
        } => {
            let planner = load_planner(input.as_deref())?;
            let report = planner
                .long_weekends(tolerance, min_count)
                .context("Invalid long-weekend query")?;
            info!(
                persons = report.results.len(),
                failures = report.failures.len(),
                "report ready"
            );
            write_output(output.as_deref(), &to_json(&report)?)?;
        }
        Commands::Calendar {
            input,
            output,
            person,
        } => {
            let planner = load_planner(input.as_deref())?;
            let found = planner
                .person(&person)
                .with_context(|| format!("Unknown person: '{}'", person))?;
            let calendar = planner
                .calendar_for(found)
                .with_context(|| format!("Failed to build the calendar of '{}'", person))?;

            let mut out = String::new();
            for day in calendar.off_days() {
                out.push_str(&format!("{} {}", day.date, reason_name(day.reason)));
                if let Some(label) = day.label.as_deref().filter(|l| !l.is_empty()) {
                    out.push(' ');
                    out.push_str(label);
                }
                out.push('\n');
            }
            write_output(output.as_deref(), &out)?;
        }
        Commands::Validate { input } => {
            let text = read_input(input.as_deref())?;
            match PlanConfig::from_json(&text).and_then(PlanConfig::into_planner) {
                Ok(_) => println!("ok"),
                Err(PlanError::InvalidParameter(errors)) => {
                    for err in errors.errors() {
                        println!("{}: {}", err.field, err.message);
                    }
                    anyhow::bail!("{} validation error(s)", errors.len());
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    Ok(())
}

fn load_planner(input: Option<&str>) -> Result<Planner> {
    let text = read_input(input)?;
    let config = PlanConfig::from_json(&text).context("Failed to parse plan document")?;
    config.into_planner().context("Invalid plan document")
}

fn reason_name(reason: OffReason) -> &'static str {
    match reason {
        OffReason::Holiday => "holiday",
        OffReason::WeeklyOff => "weekly_off",
        OffReason::Leave => "leave",
        OffReason::Work => "work",
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    let mut text = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    text.push('\n');
    Ok(text)
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}

//! DSC Engine CLI
//!
//! Prints protocol parameters and replays liquidation scenarios.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::{style, Term};

use dsc::core::config::ProtocolParams;
use dsc::sim::{run, Scenario, SimulationReport, StepResult};

/// DSC Engine CLI - overcollateralized synthetic dollar simulator
#[derive(Parser)]
#[command(name = "dsc")]
#[command(version = dsc::VERSION)]
#[command(about = "Command-line interface for the DSC engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default protocol parameters as JSON
    Params {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Replay a scenario file
    Simulate {
        /// Scenario JSON file
        scenario: PathBuf,

        /// Protocol parameters JSON file
        #[arg(short, long, env = "DSC_PARAMS")]
        params: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Params { out } => cmd_params(out.as_ref(), term),
        Commands::Simulate { scenario, params, json } => {
            cmd_simulate(scenario, params.as_ref(), *json, term)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_params(out: Option<&PathBuf>, term: &Term) -> anyhow::Result<()> {
    let params = ProtocolParams::default();

    match out {
        Some(path) => {
            params.save(path)?;
            term.write_line(&format!(
                "{} Parameters written to {}",
                style("✓").green(),
                style(path.display()).yellow()
            ))?;
        }
        None => term.write_line(&serde_json::to_string_pretty(&params)?)?,
    }
    Ok(())
}

fn cmd_simulate(
    scenario_path: &PathBuf,
    params_path: Option<&PathBuf>,
    json: bool,
    term: &Term,
) -> anyhow::Result<()> {
    let scenario = Scenario::load(scenario_path)?;
    let params = match params_path {
        Some(path) => ProtocolParams::load(path)?,
        None => ProtocolParams::default(),
    };

    let report = run(&scenario, params)?;

    if json {
        term.write_line(&serde_json::to_string_pretty(&report)?)?;
    } else {
        print_report(&report, term)?;
    }

    if !report.passed() {
        anyhow::bail!("{} step(s) did not behave as expected", report.failures().len());
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

fn print_report(report: &SimulationReport, term: &Term) -> anyhow::Result<()> {
    term.write_line(&format!(
        "{} Scenario {}",
        style("→").cyan(),
        style(&report.scenario).bold()
    ))?;

    for step in &report.steps {
        let marker = if step.expectation_met {
            style("✓").green()
        } else {
            style("✗").red()
        };
        let detail = match &step.result {
            StepResult::Ok => style("ok".to_string()).dim(),
            StepResult::Err { code, message } => style(format!("[{}] {}", code, message)).yellow(),
        };
        term.write_line(&format!("  {} {:>3}. {} {}", marker, step.index, step.label, detail))?;
    }

    term.write_line("")?;
    term.write_line(&format!("{} Accounts", style("→").cyan()))?;
    for account in &report.accounts {
        let collateral: Vec<String> = account
            .collateral
            .iter()
            .map(|(symbol, amount)| format!("{} {}", amount, symbol))
            .collect();
        term.write_line(&format!("  {} ({})", style(&account.name).bold(), account.address))?;
        term.write_line(&format!(
            "    Collateral: {} (${})",
            if collateral.is_empty() { "none".to_string() } else { collateral.join(", ") },
            account.collateral_value
        ))?;
        term.write_line(&format!(
            "    Debt: {}  Wallet: {} DSC  Health: {}",
            account.debt, account.dsc_balance, account.health_factor
        ))?;
    }

    term.write_line("")?;
    term.write_line(&format!("{} Protocol", style("→").cyan()))?;
    term.write_line(&format!(
        "  Total debt: {}  DSC supply: {}  Liquidations: {}",
        report.total_debt, report.dsc_supply, report.liquidations
    ))?;
    term.write_line(&format!(
        "  Conservation: {}  Solvent: {}",
        check(Some(report.conservation_holds)),
        check(report.solvent)
    ))?;
    Ok(())
}

fn check(value: Option<bool>) -> String {
    match value {
        Some(true) => style("yes").green().to_string(),
        Some(false) => style("no").red().to_string(),
        None => style("unknown").yellow().to_string(),
    }
}

mod config;
mod confirm;
mod duration;
mod extract;
mod plan;
mod results;
mod runner;
mod session;

use clap::Parser;
use config::BenchConfig;
use plan::{format_plan, plan_from_config, RunCombination};
use results::ResultWriter;
use runner::{run_benchmark, RunSettings, RunSummary};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Benchmark local LLMs across power-mode and swap configurations:
/// run the model CLI once per combination, parse its timing output,
/// and record one CSV row per run.
#[derive(Parser, Debug)]
#[command(name = "ollama-bench", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "bench.toml")]
    config: PathBuf,

    /// Output CSV path (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Per-run timeout in seconds (overrides config)
    #[arg(long)]
    timeout: Option<u64>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Print the plan and exit without running anything
    #[arg(long)]
    dry_run: bool,

    /// Pause before each combination for manual power/swap setup
    #[arg(long)]
    pause: bool,

    /// Extra logging (spawned commands, extraction details)
    #[arg(short, long)]
    verbose: bool,

    /// Suppress per-combination banners, only errors and summary
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(summary: &RunSummary, output: &std::path::Path) {
    println!();
    println!(
        "Benchmark finished: {} succeeded, {} failed ({} of {} planned combinations attempted).",
        summary.succeeded,
        summary.failed,
        summary.attempted(),
        summary.planned
    );
    if summary.aborted {
        println!("Run aborted: the model CLI could not be found.");
    }
    if summary.cancelled {
        println!("Run stopped by operator.");
    }
    println!("Results saved to {}", output.display());
}

/// Ask for the manual setup of a combination when `--pause` is set.
fn setup_gate(pause: bool) -> impl FnMut(&RunCombination) -> bool {
    move |combination: &RunCombination| {
        if !pause {
            return true;
        }
        let stdin = std::io::stdin();
        match confirm::wait_for_setup(&mut stdin.lock(), &mut std::io::stdout(), combination) {
            Ok(go) => go,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read operator input, stopping run");
                false
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);
    tracing::debug!(?cli, "parsed CLI arguments");

    let mut config = match BenchConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    if let Some(output) = cli.output.clone() {
        config.output_csv_file = output;
    }
    if let Some(timeout) = cli.timeout {
        config.runner.timeout_secs = timeout;
    }

    let plan = plan_from_config(&config);
    print!("{}", format_plan(&plan));
    println!(
        "Command: {} {}  (timeout {}s)",
        config.runner.command,
        config.runner.args.join(" "),
        config.runner.timeout_secs
    );
    println!("Output:  {}", config.output_csv_file.display());

    if plan.is_empty() {
        println!("Nothing to run: one of the configured lists is empty.");
        return ExitCode::SUCCESS;
    }
    if cli.dry_run {
        println!("Dry run mode, not running.");
        return ExitCode::SUCCESS;
    }

    if !cli.yes {
        let stdin = std::io::stdin();
        let question = format!("Run {} combination(s)?", plan.len());
        match confirm::confirm(&mut stdin.lock(), &mut std::io::stdout(), &question) {
            Ok(true) => {}
            Ok(false) => {
                println!("Cancelled, nothing was run.");
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                eprintln!("error: failed to read confirmation: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let mut writer = match ResultWriter::create(&config.output_csv_file) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let settings = RunSettings {
        timeout: Duration::from_secs(config.runner.timeout_secs),
        runner: config.runner,
        prompt: config.prompt,
        quiet: cli.quiet,
    };

    match run_benchmark(&settings, &plan, &mut writer, setup_gate(cli.pause)).await {
        Ok(summary) => {
            print_summary(&summary, writer.path());
            if summary.aborted {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

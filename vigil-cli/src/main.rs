use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process::ExitCode;
use tracing::warn;
use vigil_core::{init_logging, VigilConfig};

mod commands;

use commands::{cmd_explain, cmd_monitor, cmd_report, cmd_status};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Parser)]
#[command(name = "vigil")]
#[command(version = VERSION)]
#[command(about = "Vigil - performance monitoring and friendly error reporting")]
#[command(long_about = r#"
Vigil samples host and application metrics, raises alerts when thresholds
are crossed, and turns technical error messages into plain language.

Use 'vigil status' for a one-off health check, 'vigil monitor' to monitor
continuously, and 'vigil explain' to translate an error message.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show current health, metrics and recommendations")]
    Status {
        #[arg(
            short,
            long,
            default_value = "text",
            help = "Output format (text, json)"
        )]
        format: String,

        #[arg(short, long, default_value = "2", help = "Number of samples to take")]
        samples: usize,
    },

    #[command(about = "Monitor continuously and print alerts as they are raised")]
    Monitor {
        #[arg(short, long, help = "Seconds between samples (defaults to config)")]
        interval: Option<u64>,

        #[arg(short, long, help = "Stop after this many seconds")]
        duration: Option<u64>,
    },

    #[command(about = "Print the monitoring and optimization report as JSON")]
    Report {
        #[arg(short, long, default_value = "3", help = "Number of samples to take")]
        samples: usize,
    },

    #[command(about = "Explain an error message in plain language")]
    Explain {
        #[arg(help = "Error text, e.g. \"FileNotFoundError: No such file: 'a.py'\"")]
        message: String,

        #[arg(short, long, help = "Error type name, when not part of the message")]
        kind: Option<String>,

        #[arg(short, long, help = "What was being done when the error happened")]
        context: Option<String>,

        #[arg(short, long, help = "Include technical details")]
        technical: bool,
    },

    #[command(about = "Show version information")]
    Version {
        #[arg(short, long)]
        detailed: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = VigilConfig::load();
    let logging = config
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_logging(&logging, cli.verbose);
    if let Err(e) = &config {
        warn!(error = %e, "Falling back to default logging configuration");
    }

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Status { format, samples } => cmd_status(&format, samples).await,
        Commands::Monitor { interval, duration } => cmd_monitor(interval, duration).await,
        Commands::Report { samples } => cmd_report(samples).await,
        Commands::Explain {
            message,
            kind,
            context,
            technical,
        } => cmd_explain(&message, kind.as_deref(), context.as_deref(), technical),
        Commands::Version { detailed } => cmd_version(detailed),
    }
}

fn cmd_version(detailed: bool) -> anyhow::Result<()> {
    if detailed {
        println!("{}", "Vigil Version Information".cyan().bold());
        println!("{}", "═".repeat(40).dimmed());
        println!("  {:<15} {}", "Version:".bold(), VERSION);
        println!("  {:<15} {}", "Name:".bold(), NAME);
        println!("  {:<15} Apache-2.0", "License:".bold());
        println!();
        println!("  {}", "Components:".bold());
        println!("    ◎ Real-time monitor and alerts");
        println!("    ◈ Result cache (memory and file)");
        println!("    ⬡ Operation timing");
        println!("    ◇ Error handler and humanizer");
        println!();
        println!("  {}", "Build Information:".bold());
        println!("    Rust Edition: 2021");
        #[cfg(debug_assertions)]
        println!("    Build:        Debug");
        #[cfg(not(debug_assertions))]
        println!("    Build:        Release");
    } else {
        println!("vigil {}", VERSION);
    }

    Ok(())
}

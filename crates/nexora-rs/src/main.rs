use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use nexora::config::AppConfig;
use nexora::models::{ScanMode, ScanRun, Tool};
use nexora::report;
use nexora::service::ScanService;

/// Nexora - scan orchestration and reporting engine
#[derive(Parser)]
#[command(name = "nexora", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scan against a target and wait for it to finish
    Scan {
        /// IP address, domain name or http(s) URL
        target: String,

        /// Scan mode (quick, balanced or deep)
        #[arg(short, long, default_value = "balanced")]
        mode: String,

        /// Tools to consider, comma-separated (nmap, zap, arachni)
        #[arg(short, long, value_delimiter = ',', default_values_t = [
            "nmap".to_string(), "zap".to_string(), "arachni".to_string()
        ])]
        tools: Vec<String>,

        /// Also write a JSON report to this path
        #[arg(long)]
        json: Option<PathBuf>,

        /// Also write a PDF report to this path
        #[arg(long)]
        pdf: Option<PathBuf>,
    },

    /// List recent scan runs
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },

    /// Show one scan run in detail
    Show {
        /// Run id as printed by `scan` or `list`
        run_id: Uuid,
    },

    /// Write a report for a finished scan run
    Report {
        run_id: Uuid,

        /// Report format (json or pdf)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file (default: nexora_<run_id>.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Arc::new(AppConfig::load()?);
    let service = ScanService::new(config).await?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            target,
            mode,
            tools,
            json,
            pdf,
        } => {
            let mode = parse_mode(&mode)?;
            let selection = parse_tools(&tools)?;
            let run = service.run_to_completion(&target, mode, selection).await?;
            print_run(&run);
            if let Some(path) = json {
                write_report(&path, service.report_json(run.id).await?).await?;
            }
            if let Some(path) = pdf {
                write_report(&path, service.report_pdf(run.id).await?).await?;
            }
        }
        Commands::List { limit } => {
            let runs = service.list_runs(limit).await?;
            if runs.is_empty() {
                println!("no scan runs recorded");
            }
            for summary in runs {
                println!(
                    "{}  {:<10} {:<22} {:<8} {}",
                    summary.created_at.format("%Y-%m-%d %H:%M:%S"),
                    summary.status,
                    truncate(&summary.target, 22),
                    summary.mode,
                    summary.id,
                );
            }
        }
        Commands::Show { run_id } => {
            let run = service.get_run(run_id).await?;
            print_run(&run);
        }
        Commands::Report {
            run_id,
            format,
            output,
        } => {
            let (bytes, ext) = match format.as_str() {
                "json" => (service.report_json(run_id).await?, "json"),
                "pdf" => (service.report_pdf(run_id).await?, "pdf"),
                other => bail!("unknown report format '{other}' (expected json or pdf)"),
            };
            let path =
                output.unwrap_or_else(|| PathBuf::from(format!("nexora_{run_id}.{ext}")));
            write_report(&path, bytes).await?;
        }
    }
    Ok(())
}

async fn write_report(path: &std::path::Path, bytes: Vec<u8>) -> anyhow::Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing report to {}", path.display()))?;
    println!("report written to {}", path.display());
    Ok(())
}

fn parse_mode(text: &str) -> anyhow::Result<ScanMode> {
    text.parse()
        .map_err(|_| anyhow::anyhow!("unknown mode '{text}' (expected quick, balanced or deep)"))
}

fn parse_tools(tools: &[String]) -> anyhow::Result<Vec<Tool>> {
    tools
        .iter()
        .map(|t| {
            t.parse::<Tool>().map_err(|_| {
                anyhow::anyhow!("unknown tool '{t}' (expected nmap, zap or arachni)")
            })
        })
        .collect()
}

fn print_run(run: &ScanRun) {
    println!("run      {}", run.id);
    println!("target   {} ({})", run.target.raw, run.target.kind);
    println!("mode     {}", run.mode);
    println!("status   {}", run.status);
    println!("created  {}", run.created_at.to_rfc3339());
    for outcome in &run.outcomes {
        let detail = outcome
            .error_detail
            .as_deref()
            .map(|d| format!(" ({d})"))
            .unwrap_or_default();
        println!(
            "  {:<8} {:<10} {} findings{detail}",
            outcome.tool.to_string(),
            outcome.status.to_string(),
            outcome.findings.len(),
        );
        for finding in report::sorted_findings(outcome) {
            println!(
                "    [{}] {}",
                finding.severity.to_string().to_uppercase(),
                finding.title
            );
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

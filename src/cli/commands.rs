use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::extractor::extract_error_blocks;
use crate::infra::{logging, AnalyzerConfig, PerfLog, TimingSink};
use crate::llm::OllamaClient;

const PREVIEW_CHARS: usize = 1000;

#[derive(Parser)]
#[command(name = "tomcat-analyzer")]
#[command(about = "Scan Tomcat logs and stream a root-cause analysis from Ollama", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the Tomcat log file (e.g. catalina.out)
    pub logfile: PathBuf,

    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = AnalyzerConfig::load(&cli.config)?;
    logging::init(&config.log_dir, &config.log_file, &config.log_level)?;
    let perf = PerfLog::open(&config.log_dir)?;

    analyze_command(&cli.logfile, &config, &perf).await
}

async fn analyze_command(logfile: &Path, config: &AnalyzerConfig, perf: &PerfLog) -> Result<()> {
    // Phase 1: load the file. Tomcat logs occasionally carry invalid
    // UTF-8; read raw bytes and decode lossily instead of failing.
    let t0 = Instant::now();
    let raw_bytes = std::fs::read(logfile)
        .with_context(|| format!("Failed to read log file {}", logfile.display()))?;
    let raw_log = String::from_utf8_lossy(&raw_bytes);
    perf.record(&format!(
        "Time to load log file: {:.4} sec",
        t0.elapsed().as_secs_f64()
    ));

    // Phase 2: extract error blocks
    let t1 = Instant::now();
    let error_log = extract_error_blocks(&raw_log, config.max_error_lines);
    perf.record(&format!(
        "Time to parse log: {:.4} sec",
        t1.elapsed().as_secs_f64()
    ));

    if error_log.trim().is_empty() {
        println!("No relevant errors found.");
        return Ok(());
    }

    println!("\n{}\n", "🔍 Extracted Error Log Preview:".bold());
    let preview: String = error_log.chars().take(PREVIEW_CHARS).collect();
    println!("{preview}...\n");

    println!("{}\n", "🤖 Analyzing with remote Ollama (streaming)...".bold());

    let client = OllamaClient::new(&config.ollama_host, &config.model);
    let mut stdout = std::io::stdout();
    let summary = client.analyze(&error_log, &mut stdout, Some(perf)).await?;

    if summary.is_empty() {
        println!("\n{} No summary returned. Check logs.", "❌".red());
    } else {
        println!("\n{}\n", "🧠 Final Summary:".bold());
        println!("{summary}");
    }

    Ok(())
}

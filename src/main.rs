//! GrantFlow - multi-agent grant proposal generator
//!
//! Main entry point for the GrantFlow CLI.

use grantflow::config::{validate_config_result, GrantFlowConfig};
use grantflow::document::PlainTextReader;
use grantflow::llm::GroqModel;
use grantflow::pipeline::{build_system, system_status, ProposalOutcome, ProposalPipeline};
use grantflow::swarm::AgentSystem;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// GrantFlow - turn a research paper into a grant proposal with a team of agents
#[derive(Parser, Debug)]
#[command(name = "grantflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/grantflow/config.yaml)
    #[arg(short, long, env = "GRANTFLOW_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Generate a grant proposal from a paper
    Generate {
        /// Paper to analyse (UTF-8 text, pages separated by form feeds)
        paper: PathBuf,

        /// Write the full outcome as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the agents and print the system status as JSON
    Status,
}

fn main() {
    // Initialize logging
    if let Err(e) = grantflow::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> grantflow::Result<()> {
    if let Commands::Init = cli.command {
        return handle_init_command(&cli.config);
    }

    let config = load_config(&cli.config)?;
    validate_config_result(&config)?;

    match cli.command {
        Commands::Generate { paper, output } => handle_generate_command(&config, paper, output),
        Commands::Status => handle_status_command(&config),
        Commands::Init => unreachable!("Init is handled before loading configuration"),
    }
}

/// Explicit paths must exist; a missing default file means built-in defaults
fn load_config(config_path: &Option<String>) -> grantflow::Result<GrantFlowConfig> {
    if let Some(path) = config_path {
        return GrantFlowConfig::load(path);
    }

    let path = GrantFlowConfig::default_path();
    if path.exists() {
        GrantFlowConfig::load(&path)
    } else {
        tracing::info!(path = %path.display(), "No configuration file, using defaults");
        Ok(GrantFlowConfig::default())
    }
}

fn handle_init_command(config_path: &Option<String>) -> grantflow::Result<()> {
    let config_file = if let Some(path) = config_path {
        PathBuf::from(path)
    } else {
        GrantFlowConfig::default_path()
    };

    // Check if already initialized
    if config_file.exists() {
        println!("Configuration already exists at {}", config_file.display());
        return Ok(());
    }

    let config = GrantFlowConfig::new();
    config.save(&config_file)?;

    println!("✓ Created configuration at {}", config_file.display());
    println!();
    println!("Next steps:");
    println!("  1. Export your Groq API key:");
    println!("     export {}=<key>", config.llm.api_key_env);
    println!();
    println!("  2. Generate a proposal:");
    println!("     grantflow generate paper.txt --output proposal.json");

    Ok(())
}

fn build(config: &GrantFlowConfig) -> grantflow::Result<AgentSystem> {
    let llm = Arc::new(GroqModel::from_config(&config.llm)?);
    build_system(config, llm, Arc::new(PlainTextReader::new()))
}

fn handle_generate_command(
    config: &GrantFlowConfig,
    paper: PathBuf,
    output: Option<PathBuf>,
) -> grantflow::Result<()> {
    let system = build(config)?;
    system.start_all_agents()?;

    let pipeline = ProposalPipeline::from_config(system.mailbox().clone(), &config.pipeline);
    let outcome = pipeline.generate(&paper);

    if !system.stop_all_agents() {
        tracing::warn!("Some agents did not stop within the join timeout");
    }

    print_outcome(&outcome);

    if let Some(output) = output {
        let json = serde_json::to_string_pretty(&outcome)?;
        std::fs::write(&output, json)?;
        println!();
        println!("✓ Wrote {}", output.display());
    }

    match (&outcome.failed_stage, &outcome.error) {
        (Some(_), Some(error)) => Err(grantflow::GrantFlowError::Other(error.clone())),
        _ => Ok(()),
    }
}

fn print_outcome(outcome: &ProposalOutcome) {
    println!("Paper: {}", outcome.paper_path.display());

    if let Some(analysis) = &outcome.analysis {
        let title = analysis.get("title").and_then(|v| v.as_str()).unwrap_or("N/A");
        let novelty = analysis
            .get("novelty_assessment")
            .and_then(|n| n.get("score"))
            .cloned()
            .unwrap_or_default();
        println!("  Title:                {}", title);
        println!("  Novelty:              {}/10", novelty);
    }
    if let Some(evaluation) = &outcome.evaluation {
        let overall = evaluation
            .get("scores")
            .and_then(|s| s.get("overall"))
            .cloned()
            .unwrap_or_default();
        let funding = evaluation
            .get("funding_potential")
            .and_then(|v| v.as_str())
            .unwrap_or("N/A");
        println!("  Overall score:        {}/10", overall);
        println!("  Funding potential:    {}", funding);
    }
    if let Some(innovations) = &outcome.innovations {
        let directions = innovations
            .get("future_directions")
            .and_then(|v| v.as_array())
            .map_or(0, Vec::len);
        let commercial = innovations
            .get("commercial_potential")
            .and_then(|v| v.as_str())
            .unwrap_or("N/A");
        println!("  Future directions:    {}", directions);
        println!("  Commercial potential: {}", commercial);
    }

    if !outcome.conflicts.is_empty() {
        println!();
        println!("Conflicts ({}):", outcome.conflicts.len());
        for conflict in &outcome.conflicts {
            println!("  - {}: {}", conflict.conflict_type, conflict.description);
            println!("    Resolution: {}", conflict.resolution);
        }
    }

    println!();
    if outcome.success {
        println!("✓ Proposal complete ({} words)", outcome.word_count());
        if let Some(text) = outcome.full_text() {
            println!();
            println!("{}", text);
        }
    } else if let Some(stage) = outcome.failed_stage {
        let reason = outcome
            .details
            .as_ref()
            .and_then(|d| d.get("error"))
            .and_then(|e| e.as_str())
            .unwrap_or("unknown error");
        println!("✗ {} failed: {}", stage, reason);
    }
}

fn handle_status_command(config: &GrantFlowConfig) -> grantflow::Result<()> {
    let status = system_status(config, Arc::new(PlainTextReader::new()))?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

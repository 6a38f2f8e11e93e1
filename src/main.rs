//! quizloop CLI entry point

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quizloop::agent::{AgentLoop, Conversation};
use quizloop::config::{self, Config};
use quizloop::ui;

#[derive(Parser)]
#[command(name = "quizloop")]
#[command(about = "Autonomous quiz-solving agent")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.quizloop/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the quiz chain starting at URL
    Run {
        /// First quiz URL
        url: String,

        /// Write the final (or partial) conversation as JSON
        #[arg(short, long)]
        transcript: Option<PathBuf>,

        /// Override the configured step budget
        #[arg(long)]
        max_steps: Option<usize>,
    },

    /// Write a default config file
    Init,

    /// Show the effective configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { url, transcript, max_steps } => {
            let mut config = config::load(cli.config.as_deref())?;
            if let Some(max_steps) = max_steps {
                config.max_steps = max_steps;
            }
            run(&config, &url, transcript.as_deref()).await?;
        }

        Commands::Init => {
            let path = cli.config.unwrap_or_else(config::config_path);
            if path.exists() {
                ui::print_warning(&format!("Config already exists at {}", path.display()));
                return Ok(());
            }
            config::save(&Config::default(), &path)?;
            ui::print_success(&format!("Wrote {}", path.display()));
            ui::print_step("Set primary.api_key (or AIPIPE_API_KEY), email and secret before running.");
        }

        Commands::Status => {
            let config = config::load(cli.config.as_deref())?;
            let set = |value: &str| if value.is_empty() { "not set" } else { "✓" };

            println!("quizloop status\n");
            println!("Workspace: {:?}", config.workspace);
            println!("Email: {}", set(&config.email));
            println!("Secret: {}", set(&config.secret));
            println!("Primary: {} @ {} (key {})", config.primary.model, config.primary.base_url, set(&config.primary.api_key));
            match &config.secondary {
                Some(secondary) => println!(
                    "Secondary: {} (key {}, {} retries)",
                    secondary.model,
                    set(&secondary.api_key),
                    secondary.max_retries
                ),
                None => println!("Secondary: not configured (set GOOGLE_API_KEY)"),
            }
            println!("Step budget: {}", config.max_steps);
        }
    }

    Ok(())
}

async fn run(config: &Config, url: &str, transcript: Option<&Path>) -> Result<()> {
    let agent = AgentLoop::from_config(config)?;
    ui::print_run_header(
        url,
        &config.primary.model,
        config.secondary.as_ref().map(|s| s.model.as_str()),
    );

    match agent.run(url).await {
        Ok(conversation) => {
            write_transcript(transcript, &conversation)?;
            ui::print_run_summary(&conversation);
            Ok(())
        }
        Err(failure) => {
            write_transcript(transcript, &failure.conversation)?;
            ui::print_error(&format!(
                "Run aborted after {} messages: {}",
                failure.conversation.len(),
                failure.error
            ));
            Err(failure.into())
        }
    }
}

fn write_transcript(path: Option<&Path>, conversation: &Conversation) -> Result<()> {
    if let Some(path) = path {
        std::fs::write(path, serde_json::to_string_pretty(conversation)?)?;
        ui::print_step(&format!("Transcript written to {}", path.display()));
    }
    Ok(())
}

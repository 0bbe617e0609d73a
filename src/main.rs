use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod decode;
mod error;
mod gateway;
mod github;
mod http;
mod patch;
mod pipeline;
mod prompt;
mod publish;
mod recorder;
mod request;
mod snapshot;
mod stage;
mod store;

use config::Config;
use gateway::GeminiClient;
use github::GithubClient;
use pipeline::Pipeline;
use request::ChangeRequest;
use store::FileRecordStore;

/// Pullsmith - turn a change request into a pull request
#[derive(Parser)]
#[command(name = "pullsmith")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one change request
    Run {
        /// Hosting-platform access token
        #[arg(long, env = "PULLSMITH_TOKEN")]
        token: Option<String>,

        /// Repository name (owned by the authenticated user)
        #[arg(long)]
        repo: Option<String>,

        /// Source branch to change and target with the pull request
        #[arg(long)]
        branch: Option<String>,

        /// The natural-language change request
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Show resolved configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Run {
            token,
            repo,
            branch,
            prompt,
        }) => {
            let request = ChangeRequest {
                access_token: token.unwrap_or_default(),
                repository_name: repo.unwrap_or_default(),
                repository_branch: branch.unwrap_or_default(),
                user_prompt: prompt.unwrap_or_default(),
            };
            run_pipeline(request).await?;
        }
        Some(Commands::Status) => {
            run_status();
        }
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            eprintln!("Use 'pullsmith run' to turn a change request into a pull request.");
        }
    }

    Ok(())
}

async fn run_pipeline(request: ChangeRequest) -> Result<()> {
    let config = Config::from_env()?;

    let gateway = GeminiClient::new(
        config.model_base_url.clone(),
        config.model_name.clone(),
        config.model_api_key.clone(),
    )?;
    let host = GithubClient::new(config.github_api_url.clone(), request.access_token.clone())?;
    let store = FileRecordStore::new(config.state_dir.join("records"))?;

    let pipeline = Pipeline::new(gateway, host, store, config.work_dir.clone());
    let outcome = pipeline.run(&request).await?;

    println!("✅ Opened pull request: {}", outcome.pull_request_url);
    println!("   Branch: {}", outcome.branch);
    println!("   Commit: {}", outcome.commit_sha);
    println!("   Changed files: {}", outcome.changed_files);

    Ok(())
}

fn run_status() {
    match Config::from_env() {
        Ok(config) => {
            println!("✅ Configuration resolved");
            println!(
                "   Model: {} ({})",
                config.model_name, config.model_base_url
            );
            println!("   Hosting API: {}", config.github_api_url);
            println!("   State dir: {}", config.state_dir.display());
            println!("   Work dir: {}", config.work_dir.display());
        }
        Err(e) => {
            println!("❌ Configuration incomplete: {:#}", e);
            println!(
                "   Set {} to configure the model backend.",
                config::MODEL_API_KEY_ENV
            );
        }
    }
}

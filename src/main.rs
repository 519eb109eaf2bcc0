//! Browser delegate CLI
//!
//! Stands in for the connection layer: builds instructions, hands them to
//! the executor and prints the callback outcomes.

use browser_delegate::{
    init_logging, ChromiumEngine, Config, EngineHandle, Instruction, InstructionExecutor,
    ResourceRegistry, SignalGuard,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

#[derive(Parser)]
#[command(name = "browser-delegate")]
#[command(about = "Remote-instruction delegate for browser automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Headless mode
    #[arg(long, default_value_t = true)]
    headless: bool,

    /// Report instruction failures instead of treating them as fatal
    #[arg(long, default_value_t = true)]
    catch_errors: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a page and leave it tracked by the delegate
    Open {
        /// URL to visit
        url: String,
    },

    /// Adopt the engine's browser: track it and configure its pages
    Adopt,

    /// Open each URL listed in a JSON file, in order
    Run {
        /// JSON file with an array of URLs
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env();

    let registry = Arc::new(ResourceRegistry::new());
    SignalGuard::install(Arc::clone(&registry));

    let engine: Arc<dyn EngineHandle> = Arc::new(ChromiumEngine::launch(cli.headless).await?);
    let executor = InstructionExecutor::new(config, Arc::clone(&registry));

    match cli.command {
        Commands::Open { url } => {
            let url = Url::parse(&url)?;
            open_url(&executor, Arc::clone(&engine), cli.catch_errors, url).await?;
        }

        Commands::Adopt => {
            let instruction = Instruction::new(Arc::clone(&engine), cli.catch_errors, |engine| {
                async move {
                    let value = engine.browser().await?;
                    Ok(Some(value))
                }
            });

            executor
                .execute(
                    instruction,
                    |value| match value {
                        Some(value) => println!("✓ Adopted {}", value.type_name()),
                        None => println!("✓ Nothing to adopt"),
                    },
                    |error| eprintln!("✗ Adoption failed: {:?}", error),
                )
                .await?;
        }

        Commands::Run { file } => {
            println!("Executing instructions from: {}", file.display());

            let json = std::fs::read_to_string(file)?;
            let urls: Vec<String> = serde_json::from_str(&json)?;

            println!("Executing {} instruction(s)...", urls.len());

            for (idx, raw) in urls.iter().enumerate() {
                println!("\n[{}/{}] {}", idx + 1, urls.len(), raw);
                let url = Url::parse(raw)?;
                open_url(&executor, Arc::clone(&engine), cli.catch_errors, url).await?;
            }

            println!("\n✓ All instructions completed");
        }
    }

    // Print stats
    let stats = executor.stats().await;
    println!("\n=== Statistics ===");
    println!("Executed: {}", stats.executed);
    println!("Succeeded: {}", stats.succeeded);
    println!("Recovered failures: {}", stats.recovered_failures);
    println!("Fatal failures: {}", stats.fatal_failures);
    println!("Browsers tracked: {}", registry.len());

    Ok(())
}

async fn open_url(
    executor: &InstructionExecutor,
    engine: Arc<dyn EngineHandle>,
    catch_errors: bool,
    url: Url,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = url.to_string();
    let instruction = Instruction::new(engine, catch_errors, move |engine| async move {
        let value = engine.open_page(url.as_str()).await?;
        Ok(Some(value))
    });

    executor
        .execute(
            instruction,
            |value| match value {
                Some(value) => println!("✓ Opened {} ({})", target, value.type_name()),
                None => println!("✓ Opened {}", target),
            },
            |error| eprintln!("✗ Failed to open page: {:?}", error),
        )
        .await?;

    Ok(())
}

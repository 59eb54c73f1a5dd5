//! Steward CLI - entry point for the Steward Discord assistant

use anyhow::{Context as _, Result, anyhow};
use clap::{Parser, Subcommand};
use console::Style;
use steward_core::{
    Channel, DiscordChannel, OpenAiProvider, default_config, get_config_path, load_config,
    save_config, schema::CommandSchema,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const STEWARD_LOGO: &str = r#"
  ____  _                             _
 / ___|| |_ _____      ____ _ _ __ __| |
 \___ \| __/ _ \ \ /\ / / _` | '__/ _` |
  ___) | ||  __/\ V  V / (_| | | | (_| |
 |____/ \__\___| \_/\_/ \__,_|_|  \__,_|
"#;

/// Steward - natural-language Discord administration
#[derive(Parser, Debug)]
#[command(name = "steward")]
#[command(version)]
#[command(about = "Steward - natural-language Discord administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize steward configuration
    Onboard,

    /// Connect to Discord and start handling messages
    Run {
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show configuration status
    Status,

    /// List the supported actions and their parameters
    Actions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => onboard().await,
        Commands::Run { verbose } => run(verbose).await,
        Commands::Status => status().await,
        Commands::Actions => {
            print_actions();
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "steward_core=debug,steward=debug"
    } else {
        "steward_core=info,steward=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

async fn onboard() -> Result<()> {
    let cyan = Style::new().cyan();
    println!("{}", cyan.apply_to(STEWARD_LOGO));

    let config_path = get_config_path();
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }

    let config = default_config();
    save_config(&config)
        .await
        .context("failed to write default config")?;

    println!("Wrote default config to {}", config_path.display());
    println!("Fill in discord.token and provider.api_key, then run `steward run`.");
    println!("Secrets can also come from STEWARD_DISCORD_TOKEN and STEWARD_PROVIDER_API_KEY.");
    Ok(())
}

async fn run(verbose: bool) -> Result<()> {
    init_tracing(verbose);

    let config = load_config()
        .await
        .context("failed to load config (run `steward onboard` first)")?;

    let api_key = config
        .api_key()
        .ok_or_else(|| anyhow!("no provider API key configured"))?;
    let mut provider = OpenAiProvider::new(api_key).with_model(&config.provider.model);
    if let Some(ref base) = config.provider.api_base {
        provider = provider.with_api_base(base);
    }

    let channel = DiscordChannel::new(&config, Arc::new(provider))
        .context("failed to set up the Discord channel")?;

    let green = Style::new().green();
    println!("{}", green.apply_to(STEWARD_LOGO));
    println!("Connecting to Discord...");

    channel.start().await.context("discord channel failed")?;
    Ok(())
}

async fn status() -> Result<()> {
    let config_path = get_config_path();
    if !config_path.exists() {
        println!("No config found. Run `steward onboard` first.");
        return Ok(());
    }

    let config = load_config().await?;
    let ok = Style::new().green();
    let missing = Style::new().red();

    println!("Config: {}", config_path.display());
    println!(
        "Discord token: {}",
        if config.discord.token.is_empty() {
            missing.apply_to("missing")
        } else {
            ok.apply_to("set")
        }
    );
    println!(
        "Provider API key: {}",
        if config.provider.api_key.is_empty() {
            missing.apply_to("missing")
        } else {
            ok.apply_to("set")
        }
    );
    println!("Model: {}", config.provider.model);
    Ok(())
}

fn print_actions() {
    let bold = Style::new().bold();
    let schema = CommandSchema::builtin();

    for action in schema.actions() {
        println!("{}", bold.apply_to(action.name));
        println!("  {}", action.description);
        for param in &action.params {
            let required = if param.required { "required" } else { "optional" };
            println!("  - {} ({}, {})", param.name, param.kind.label(), required);
        }
        println!("  e.g. {}", action.usage);
        println!();
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};

use relaybot_core::channel::telegram::TelegramChannel;
use relaybot_core::config::{self, Config};

#[derive(Parser)]
#[command(
    name = "relaybot",
    about = "relaybot - Telegram relay to an OpenAI-compatible chat API",
    version = relaybot_core::VERSION,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config to ~/.relaybot/config.json
    Onboard,
    /// Serve Telegram webhooks
    Serve {
        /// Listen port (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Register the webhook URL with Telegram
    SetWebhook {
        /// Public base URL; the bot token is appended as the path
        url: String,
    },
    /// Remove the webhook registration
    DeleteWebhook,
    /// Show configuration and webhook status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relaybot=info".parse()?)
                .add_directive("relaybot_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => cmd_onboard()?,
        Commands::Serve { port } => cmd_serve(port).await?,
        Commands::SetWebhook { url } => cmd_set_webhook(&url).await?,
        Commands::DeleteWebhook => cmd_delete_webhook().await?,
        Commands::Status => cmd_status().await?,
    }

    Ok(())
}

fn cmd_onboard() -> Result<()> {
    let config_path = config::get_config_path();

    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        println!("Delete it first to re-onboard.");
        return Ok(());
    }

    config::save_config(&Config::default(), None)?;
    println!("Created config at {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Set telegram.token and completion.apiKey in the config");
    println!("     (or TELEGRAM_BOT_TOKEN and APIKEY in the environment)");
    println!("  2. relaybot set-webhook https://your.host");
    println!("  3. relaybot serve");
    Ok(())
}

async fn cmd_serve(port: Option<u16>) -> Result<()> {
    let mut cfg = config::load_config_from_env();
    if let Some(port) = port {
        cfg.server.port = port;
    }
    relaybot_core::service::gateway::run_gateway(cfg).await
}

fn webhook_url(base: &str, token: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), token)
}

async fn cmd_set_webhook(base: &str) -> Result<()> {
    let cfg = config::load_config_from_env();
    let channel = TelegramChannel::new(&cfg.telegram)?;
    let secret = Some(cfg.telegram.webhook_secret.as_str());
    channel
        .set_webhook(&webhook_url(base, &cfg.telegram.token), secret)
        .await?;
    println!("Webhook registered.");
    Ok(())
}

async fn cmd_delete_webhook() -> Result<()> {
    let cfg = config::load_config_from_env();
    TelegramChannel::new(&cfg.telegram)?.delete_webhook().await?;
    println!("Webhook removed.");
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let config_path = config::get_config_path();
    let cfg = config::load_config_from_env();

    println!("relaybot {} ({})\n", relaybot_core::VERSION, relaybot_core::GIT_HASH);
    println!(
        "Config: {} {}",
        config_path.display(),
        if config_path.exists() { "✓" } else { "✗" }
    );
    println!(
        "Telegram token: {}",
        if cfg.telegram.token.is_empty() { "not set" } else { "✓" }
    );
    println!(
        "Completion API key: {}",
        if cfg.completion.api_key.is_empty() { "not set" } else { "✓" }
    );
    println!("Completion: {} via {}", cfg.completion.model, cfg.completion.api_base);
    println!("Image endpoint: {}", cfg.image.endpoint);
    println!("Store: {:?} at {}", cfg.store.backend, cfg.store_path().display());
    println!("Listen: {}", cfg.server.addr());

    if cfg.telegram.token.is_empty() {
        return Ok(());
    }
    match TelegramChannel::new(&cfg.telegram)?.webhook_info().await {
        Ok(info) => println!(
            "Webhook: {}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        ),
        Err(e) => println!("Webhook: unavailable ({})", e),
    }
    Ok(())
}

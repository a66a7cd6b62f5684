
use crate::agent::{EchoAgent, WebhookAgent};
use crate::channels::base::{ChannelPlugin, OutboundTarget};
use crate::channels::manager::ChannelManager;
use crate::channels::rocketchat::RocketChatPlugin;
use crate::config::{Config, get_config_path, load_config};
use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use rocketlink_core::AgentRuntime;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "rocketlink")]
#[command(about = "Rocket.Chat polling bridge for agent runtimes")]
#[command(version)]
pub struct Cli {
    /// Config file (default: ~/.rocketlink/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll configured accounts and hand new messages to the agent
    Run {
        /// Only run this account
        #[arg(long)]
        account: Option<String>,
        /// Echo mode: reply with the inbound text instead of calling the agent
        #[arg(long)]
        echo: bool,
    },
    /// Post a message to a channel (`#name`) or room (`room:<id>`)
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        text: String,
        /// Reply inside this thread
        #[arg(long)]
        thread: Option<String>,
        #[arg(long)]
        account: Option<String>,
    },
    /// Check that the account credentials work
    Probe {
        #[arg(long)]
        account: Option<String>,
    },
    /// List configured accounts
    Accounts,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { account, echo } => {
            run_accounts(config, account, echo).await?;
        }
        Commands::Send {
            to,
            text,
            thread,
            account,
        } => {
            let manager = offline_manager(config);
            let target = OutboundTarget {
                to,
                text,
                thread_id: thread,
            };
            let id = manager.send(account.as_deref(), &target).await?;
            println!("\u{2713} Sent message {}", id);
        }
        Commands::Probe { account } => {
            let manager = offline_manager(config);
            let result = manager.probe(account.as_deref()).await?;
            if result.ok {
                println!("\u{2713} {}", result.detail);
            } else {
                bail!("probe failed: {}", result.detail);
            }
        }
        Commands::Accounts => {
            list_accounts(&config, cli.config);
        }
    }

    Ok(())
}

/// Agent used by `run`: echo when asked, else the configured webhook.
fn build_runtime(config: &Config, echo: bool) -> Result<Arc<dyn AgentRuntime>> {
    if echo {
        return Ok(Arc::new(EchoAgent));
    }
    if config.agent.webhook_url.is_empty() {
        bail!("no agent configured: set agent.webhookUrl or run with --echo");
    }
    Ok(Arc::new(WebhookAgent::new(&config.agent)?))
}

/// Manager for commands that never dispatch inbound messages.
fn offline_manager(config: Config) -> ChannelManager {
    ChannelManager::new(config, Arc::new(RocketChatPlugin::new(Arc::new(EchoAgent))))
}

async fn run_accounts(config: Config, account: Option<String>, echo: bool) -> Result<()> {
    let runtime = build_runtime(&config, echo)?;
    let manager = ChannelManager::new(config, Arc::new(RocketChatPlugin::new(runtime)));

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nShutting down...");
            stopper.cancel();
        }
    });

    if echo {
        println!("Starting rocketlink in ECHO mode (no agent)...");
    } else {
        println!("Starting rocketlink...");
    }
    info!("accounts: {:?}", manager.runnable_accounts());
    manager.run(cancel, account.as_deref()).await
}

fn list_accounts(config: &Config, explicit_path: Option<PathBuf>) {
    let plugin = RocketChatPlugin::new(Arc::new(EchoAgent));
    let ids = plugin.list_account_ids(config);
    if ids.is_empty() {
        let path = explicit_path
            .or_else(|| get_config_path().ok())
            .map_or_else(|| "config.json".to_string(), |p| p.display().to_string());
        println!("No Rocket.Chat accounts configured (edit {})", path);
        return;
    }
    for id in ids {
        if let Some(account) = plugin.resolve_account(config, &id) {
            println!("  {}", plugin.describe_account(&account));
        }
    }
}

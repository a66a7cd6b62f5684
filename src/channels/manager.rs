use crate::channels::base::{ChannelPlugin, OutboundTarget, ProbeResult};
use crate::config::{Config, DEFAULT_ACCOUNT_ID, ResolvedAccount};
use anyhow::{Result, anyhow, bail};
use rocketlink_core::BridgeError;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Runs one independent engine per account of a channel plugin.
pub struct ChannelManager {
    config: Arc<Config>,
    plugin: Arc<dyn ChannelPlugin>,
}

impl ChannelManager {
    pub fn new(config: Config, plugin: Arc<dyn ChannelPlugin>) -> Self {
        Self {
            config: Arc::new(config),
            plugin,
        }
    }

    pub fn plugin(&self) -> &dyn ChannelPlugin {
        self.plugin.as_ref()
    }

    pub fn accounts(&self) -> Vec<ResolvedAccount> {
        self.plugin
            .list_account_ids(&self.config)
            .iter()
            .filter_map(|id| self.plugin.resolve_account(&self.config, id))
            .collect()
    }

    /// Accounts that will actually be started.
    pub fn runnable_accounts(&self) -> Vec<String> {
        self.accounts()
            .into_iter()
            .filter(|a| {
                if !a.enabled {
                    tracing::info!("Skipping disabled account {}", a.account_id);
                    return false;
                }
                if !a.can_poll() {
                    tracing::warn!("Skipping incomplete account {}", a.account_id);
                    return false;
                }
                true
            })
            .map(|a| a.account_id)
            .collect()
    }

    /// Explicit `account_id`, or the only/default configured account.
    pub fn select_account(&self, account_id: Option<&str>) -> Result<ResolvedAccount> {
        if let Some(id) = account_id {
            return self
                .plugin
                .resolve_account(&self.config, id)
                .ok_or_else(|| anyhow!("unknown account: {}", id));
        }
        let ids = self.plugin.list_account_ids(&self.config);
        let id = match ids.as_slice() {
            [] => bail!("no {} accounts configured", self.plugin.meta().label),
            [only] => only.clone(),
            _ if ids.iter().any(|i| i == DEFAULT_ACCOUNT_ID) => DEFAULT_ACCOUNT_ID.to_string(),
            _ => bail!(
                "several accounts configured ({}), pick one with --account",
                ids.join(", ")
            ),
        };
        self.plugin
            .resolve_account(&self.config, &id)
            .ok_or_else(|| anyhow!("unknown account: {}", id))
    }

    /// Start every runnable account (or just `only`) and wait for all of them.
    ///
    /// A failing account is logged and does not stop the others. Errors only when
    /// nothing could be started or every account failed.
    pub async fn run(&self, cancel: CancellationToken, only: Option<&str>) -> Result<()> {
        let ids = match only {
            Some(id) => vec![id.to_string()],
            None => self.runnable_accounts(),
        };
        if ids.is_empty() {
            bail!("no runnable {} accounts configured", self.plugin.meta().label);
        }

        let mut tasks = JoinSet::new();
        for id in ids {
            let plugin = self.plugin.clone();
            let config = self.config.clone();
            let token = cancel.child_token();
            tracing::info!("Starting account: {}", id);
            tasks.spawn(async move {
                let result = plugin.start_account(&config, &id, token).await;
                (id, result)
            });
        }

        let total = tasks.len();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(()))) => tracing::info!("Account {} stopped", id),
                Ok((id, Err(e))) => {
                    let retryable = e
                        .downcast_ref::<BridgeError>()
                        .is_none_or(BridgeError::is_retryable);
                    tracing::error!(retryable, "Account {} failed: {:#}", id, e);
                    failures.push(format!("{id}: {e:#}"));
                }
                Err(e) => {
                    tracing::error!("Account task panicked: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        if failures.len() == total {
            bail!("all accounts failed: {}", failures.join("; "));
        }
        Ok(())
    }

    pub async fn send(&self, account_id: Option<&str>, target: &OutboundTarget) -> Result<String> {
        let account = self.select_account(account_id)?;
        tracing::info!(
            "ChannelManager.send: account={}, to={}, content_len={}",
            account.account_id,
            target.to,
            target.text.len()
        );
        self.plugin.send_text(&account, target).await
    }

    pub async fn probe(&self, account_id: Option<&str>) -> Result<ProbeResult> {
        let account = self.select_account(account_id)?;
        Ok(self.plugin.probe(&account).await)
    }
}

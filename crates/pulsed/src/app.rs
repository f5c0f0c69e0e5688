//! Assembly of the run orchestrator from configuration and secrets.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use pulse_core::PulseConfig;
use pulse_health::{HttpProber, RunOrchestrator};
use pulse_notify::SlackNotifier;
use pulse_state::{StatusGateway, open_store};

/// Process-wide credentials, loaded once at startup.
pub struct Secrets {
    pub slack_token: Option<String>,
    pub slack_channel: Option<String>,
    pub store: Option<String>,
}

fn require<'a>(value: &'a Option<String>, name: &str) -> anyhow::Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("{name} is not set"))
}

fn gateway(secrets: &Secrets) -> anyhow::Result<StatusGateway> {
    let connection = require(&secrets.store, "STATUS_STORE_CONNECTION_STRING")?;
    let store = open_store(connection).context("failed to open status store")?;
    Ok(StatusGateway::new(store))
}

/// Wire the prober, store gateway and notifier into an orchestrator.
pub fn build_orchestrator(
    config: &PulseConfig,
    secrets: &Secrets,
) -> anyhow::Result<RunOrchestrator> {
    let token = require(&secrets.slack_token, "SLACK_TOKEN")?;
    let channel = require(&secrets.slack_channel, "SLACK_CHANNEL_ID")?;

    let registry = config.registry()?;
    let gateway = gateway(secrets)?;
    let prober = HttpProber::new(&config.probe).context("failed to build http prober")?;
    let notifier =
        SlackNotifier::new(token, channel, &config.notify).context("failed to build notifier")?;

    info!(targets = registry.len(), %channel, "orchestrator ready");

    Ok(RunOrchestrator::new(
        registry,
        Arc::new(prober),
        gateway,
        Arc::new(notifier),
    )
    .with_utc_offset(config.schedule.utc_offset_hours))
}

/// One line per target: store key, persisted status, URL.
///
/// Absent keys are shown as `-` and are not initialized.
pub async fn status_lines(config: &PulseConfig, secrets: &Secrets) -> anyhow::Result<Vec<String>> {
    let registry = config.registry()?;
    let gateway = gateway(secrets)?;

    let mut lines = Vec::with_capacity(registry.len());
    for target in &registry {
        let status = gateway
            .peek_status(&target.store_key)
            .await
            .with_context(|| format!("failed to read {}", target.store_key))?;
        let shown = status.map_or("-", |s| s.as_str());
        lines.push(format!("{}\t{}\t{}", target.store_key, shown, target.url_str()));
    }
    Ok(lines)
}

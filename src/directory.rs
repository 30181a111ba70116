use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// Agent record returned by the backend's directory API. Only the fields the
/// client cares about; the rest of the record stays server-side.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// REST client for the agent-lookup collaborator.
///
/// Used once per connect to validate the target agent before the realtime
/// channel is opened; never touched while a session is live.
pub struct AgentDirectory {
    http: reqwest::Client,
    api_base: String,
}

impl AgentDirectory {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    /// Fetch the agent record for `agent_id`.
    pub async fn lookup(&self, agent_id: &str) -> Result<AgentSummary> {
        let url = format!(
            "{}/api/agents/{agent_id}",
            self.api_base.trim_end_matches('/')
        );

        debug!("Looking up agent at {}", url);

        let agent: AgentSummary = self
            .http
            .get(&url)
            .send()
            .await
            .context("Agent lookup request failed")?
            .error_for_status()
            .context("Agent lookup rejected")?
            .json()
            .await
            .context("Agent lookup returned an invalid record")?;

        info!(
            "Resolved agent {} ({})",
            agent.id,
            agent.name.as_deref().unwrap_or("unnamed")
        );

        Ok(agent)
    }
}

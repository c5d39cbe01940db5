//! Remote code-interpreter sandbox over HTTP.
//!
//! The control plane creates and deletes sandboxes:
//! `POST {url}/sandboxes` with `{"templateID", "timeout"}` answers
//! `{"sandboxID"}`, and `DELETE {url}/sandboxes/{id}` tears one down. Each
//! sandbox runs an agent on [`ENVD_PORT`] that serves `POST /files?path=`,
//! `GET /files?path=` and `POST /commands`.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ports::sandbox::{CommandOutput, CommandSpec, SandboxProvider, SandboxSession};
use crate::ports::{PortError, PortFuture};

/// Port of the in-sandbox agent.
pub const ENVD_PORT: u16 = 49983;

const TEMPLATE: &str = "base";
const CONTROL_TIMEOUT: Duration = Duration::from_secs(60);
/// Slack added to a command's own timeout for the HTTP round trip.
const COMMAND_SLACK: Duration = Duration::from_secs(15);

/// Sandbox provider backed by the remote control plane.
pub struct RemoteSandbox {
    client: Client,
    api_url: String,
    domain: String,
    api_key: Option<String>,
}

impl RemoteSandbox {
    /// A provider for `api_url`, exposing ports under `domain`.
    #[must_use]
    pub fn new(
        api_url: impl Into<String>,
        domain: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            domain: domain.into(),
            api_key,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    #[serde(rename = "templateID")]
    template_id: &'a str,
    timeout: u64,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(rename = "sandboxID")]
    sandbox_id: String,
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    cmd: &'a str,
    timeout: u64,
    background: bool,
}

impl SandboxProvider for RemoteSandbox {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn open(&self, lifetime: Duration) -> PortFuture<'_, Box<dyn SandboxSession>> {
        Box::pin(async move {
            let key = self.api_key.as_deref().ok_or("no sandbox API key configured")?;
            let response = self
                .client
                .post(format!("{}/sandboxes", self.api_url))
                .header("X-API-Key", key)
                .timeout(CONTROL_TIMEOUT)
                .json(&CreateRequest { template_id: TEMPLATE, timeout: lifetime.as_secs() })
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(format!("sandbox create failed ({status}): {body}").into());
            }
            let created: CreateResponse = response.json().await?;
            debug!(sandbox = %created.sandbox_id, "sandbox created");
            let session: Box<dyn SandboxSession> = Box::new(RemoteSession {
                client: self.client.clone(),
                control_url: format!("{}/sandboxes/{}", self.api_url, created.sandbox_id),
                agent_url: format!("https://{ENVD_PORT}-{}.{}", created.sandbox_id, self.domain),
                domain: self.domain.clone(),
                api_key: key.to_string(),
                id: created.sandbox_id,
            });
            Ok(session)
        })
    }
}

struct RemoteSession {
    client: Client,
    id: String,
    control_url: String,
    agent_url: String,
    domain: String,
    api_key: String,
}

impl RemoteSession {
    async fn checked(
        response: reqwest::Response,
        what: &str,
    ) -> Result<reqwest::Response, PortError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(format!("{what} failed ({status}): {body}").into())
        }
    }
}

impl SandboxSession for RemoteSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn write_file<'a>(&'a self, path: &'a str, content: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            let response = self
                .client
                .post(format!("{}/files", self.agent_url))
                .query(&[("path", path)])
                .timeout(CONTROL_TIMEOUT)
                .body(content.to_string())
                .send()
                .await?;
            Self::checked(response, "write_file").await?;
            Ok(())
        })
    }

    fn run<'a>(&'a self, command: &'a CommandSpec) -> PortFuture<'a, CommandOutput> {
        Box::pin(async move {
            let response = self
                .client
                .post(format!("{}/commands", self.agent_url))
                .timeout(Duration::from_secs(command.timeout_secs) + COMMAND_SLACK)
                .json(&CommandRequest {
                    cmd: &command.command,
                    timeout: command.timeout_secs,
                    background: command.background,
                })
                .send()
                .await?;
            let response = Self::checked(response, "run").await?;
            if command.background {
                return Ok(CommandOutput::default());
            }
            Ok(response.json::<CommandOutput>().await?)
        })
    }

    fn read_file<'a>(&'a self, path: &'a str) -> PortFuture<'a, String> {
        Box::pin(async move {
            let response = self
                .client
                .get(format!("{}/files", self.agent_url))
                .query(&[("path", path)])
                .timeout(CONTROL_TIMEOUT)
                .send()
                .await?;
            Ok(Self::checked(response, "read_file").await?.text().await?)
        })
    }

    fn host(&self, port: u16) -> String {
        format!("{port}-{}.{}", self.id, self.domain)
    }

    fn close(&self) -> PortFuture<'_, ()> {
        Box::pin(async move {
            let response = self
                .client
                .delete(&self.control_url)
                .header("X-API-Key", &self.api_key)
                .timeout(CONTROL_TIMEOUT)
                .send()
                .await?;
            Self::checked(response, "close").await?;
            Ok(())
        })
    }
}

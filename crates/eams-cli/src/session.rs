//! Loaded configuration plus an authenticated client.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{debug, warn};

use eams_api::{Client, ClientBuilder};
use eams_core::EamsConfig;

pub struct Session {
    pub config: EamsConfig,
    pub client: Arc<Client>,
}

impl Session {
    /// Load `path` (defaults apply when it does not exist) and build the
    /// client from its `[client]` section.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            EamsConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?
        } else {
            warn!(path = %path.display(), "config file not found, using defaults");
            EamsConfig::default()
        };

        let client_config = config.client();
        if client_config.cookie().is_none() {
            warn!("no session cookie configured; requests will be rejected as unauthenticated");
        }

        let client = ClientBuilder::from_config(&client_config)?
            .build()
            .context("failed to build HTTP client")?;
        debug!(base_url = client.base_url(), "client ready");

        Ok(Self {
            config,
            client: Arc::new(client),
        })
    }

    /// `robber.student_id`, else the first student bound to the session.
    pub async fn student_id(&self) -> anyhow::Result<i64> {
        if let Some(id) = self.config.robber().student_id {
            return Ok(id);
        }
        let ids = self.client.student_ids().await?;
        match ids.first() {
            Some(&id) => {
                debug!(student_id = id, "resolved student from session");
                Ok(id)
            }
            None => bail!("no student bound to this session"),
        }
    }

    /// `robber.turn_id`, else the first round open to the student.
    pub async fn turn_id(&self, student_id: i64) -> anyhow::Result<i64> {
        if let Some(id) = self.config.robber().turn_id {
            return Ok(id);
        }
        let turns = self.client.open_turns(student_id).await?;
        match turns.first() {
            Some(turn) => {
                debug!(turn_id = turn.id, name = %turn.name, "resolved turn from session");
                Ok(turn.id)
            }
            None => bail!("no enrollment round is open for student {student_id}"),
        }
    }

    pub async fn student_and_turn(&self) -> anyhow::Result<(i64, i64)> {
        let student_id = self.student_id().await?;
        let turn_id = self.turn_id(student_id).await?;
        Ok((student_id, turn_id))
    }
}

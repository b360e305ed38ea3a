use crate::error::Result;
use crate::flag::{FlagStore, FLAG_DEPLOYED, FLAG_KEY, FLAG_TTL};
use crate::github::{ContentClient, FileLocation};
use crate::stamp;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyDeployed,
    ContentUnchanged,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadyDeployed => "already deployed (within 3 hours)",
            SkipReason::ContentUnchanged => "content unchanged",
        }
    }
}

/// How a run ended, when it did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Skipped(SkipReason),
    Deployed,
}

impl Outcome {
    /// The `result` object returned to HTTP callers.
    pub fn to_json(&self) -> Value {
        match self {
            Outcome::Skipped(reason) => json!({ "skipped": true, "reason": reason.as_str() }),
            Outcome::Deployed => json!({ "deployed": true }),
        }
    }
}

/// Runs the stamp-and-commit flow for one file.
///
/// Concurrent runs are not serialised. Two runs that both read the file
/// before either has set the flag will both try to commit; the second commit
/// carries a stale sha and is rejected by the remote.
#[derive(Clone)]
pub struct Deployer {
    location: FileLocation,
    flags: Arc<dyn FlagStore>,
    client: Arc<dyn ContentClient>,
}

impl Deployer {
    pub fn new(
        location: FileLocation,
        flags: Arc<dyn FlagStore>,
        client: Arc<dyn ContentClient>,
    ) -> Self {
        Self {
            location,
            flags,
            client,
        }
    }

    pub async fn run(&self) -> Result<Outcome> {
        self.run_at(Utc::now()).await
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<Outcome> {
        let flag = self.flags.get(FLAG_KEY).await?;
        tracing::info!(flag = ?flag, "checked deploy flag");
        if flag.as_deref() == Some(FLAG_DEPLOYED) {
            return Ok(Outcome::Skipped(SkipReason::AlreadyDeployed));
        }

        tracing::info!(location = %self.location, "reading file");
        let file = self.client.fetch_file(&self.location).await?;

        let updated = stamp::rewrite(&file.content, now);
        if updated == file.content {
            tracing::info!("content unchanged");
            return Ok(Outcome::Skipped(SkipReason::ContentUnchanged));
        }

        tracing::info!(location = %self.location, sha = %file.sha, "committing file");
        self.client
            .write_file(&self.location, &file.sha, &updated)
            .await?;

        self.flags.put(FLAG_KEY, FLAG_DEPLOYED, FLAG_TTL).await?;
        tracing::info!(ttl_secs = FLAG_TTL.as_secs(), "deploy flag set");

        Ok(Outcome::Deployed)
    }
}

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opendal::{ErrorKind, Operator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const FLAG_KEY: &str = "flag";
pub const FLAG_DEPLOYED: &str = "deployed";
pub const FLAG_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// A key-value store whose entries expire after a time-to-live.
#[async_trait]
pub trait FlagStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Deserialize, Serialize)]
struct FlagRecord {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Flags persisted as small JSON records through an opendal operator. Expiry
/// is checked on read; stale records are left in place and overwritten by the
/// next put.
#[derive(Clone)]
pub struct OperatorFlagStore {
    op: Operator,
    clock: Clock,
}

impl OperatorFlagStore {
    pub fn new(op: Operator) -> Self {
        Self::with_clock(op, Arc::new(Utc::now))
    }

    pub fn with_clock(op: Operator, clock: Clock) -> Self {
        Self { op, clock }
    }

    /// Opens a store rooted at a local folder.
    pub fn open_fs(root: &str) -> Result<Self> {
        let op = Operator::new(opendal::services::Fs::default().root(root))?.finish();
        Ok(Self::new(op))
    }

    /// A process-local store, used by tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let op = Operator::new(opendal::services::Memory::default())?.finish();
        Ok(Self::new(op))
    }

    fn record_path(key: &str) -> String {
        format!("{}.json", key)
    }
}

#[async_trait]
impl FlagStore for OperatorFlagStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let bytes = match self.op.read(&Self::record_path(key)).await {
            Ok(buf) => buf.to_vec(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: FlagRecord = serde_json::from_slice(&bytes)?;
        if record.expires_at <= (self.clock)() {
            tracing::debug!(key, expired_at = %record.expires_at, "flag expired");
            return Ok(None);
        }

        Ok(Some(record.value))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = (self.clock)()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let record = FlagRecord {
            value: value.to_string(),
            expires_at,
        };
        self.op
            .write(&Self::record_path(key), serde_json::to_vec(&record)?)
            .await?;

        Ok(())
    }
}

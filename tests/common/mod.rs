#![allow(dead_code)]

use async_trait::async_trait;
use deploy_stamp::flag::OperatorFlagStore;
use deploy_stamp::github::{ContentClient, FileLocation, RemoteFile};
use deploy_stamp::{DeployError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Barrier;

pub fn location() -> FileLocation {
    FileLocation {
        owner: "octo".to_string(),
        repo: "site".to_string(),
        path: "README.md".to_string(),
        branch: Some("main".to_string()),
    }
}

pub fn memory_flags() -> OperatorFlagStore {
    OperatorFlagStore::in_memory().expect("memory operator")
}

struct FileState {
    content: String,
    revision: u64,
}

/// In-memory stand-in for the contents API. Writes must name the current
/// sha, like the real API.
pub struct FakeRepo {
    state: Mutex<FileState>,
    read_barrier: Option<Barrier>,
    fail_fetch: Option<u16>,
    fetches: AtomicUsize,
    writes: AtomicUsize,
}

impl FakeRepo {
    pub fn new(content: &str) -> Self {
        Self {
            state: Mutex::new(FileState {
                content: content.to_string(),
                revision: 1,
            }),
            read_barrier: None,
            fail_fetch: None,
            fetches: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Holds every fetch until `n` fetches have read the file.
    pub fn with_read_barrier(mut self, n: usize) -> Self {
        self.read_barrier = Some(Barrier::new(n));
        self
    }

    pub fn failing_fetch(mut self, status: u16) -> Self {
        self.fail_fetch = Some(status);
        self
    }

    pub fn content(&self) -> String {
        self.state.lock().unwrap().content.clone()
    }

    pub fn set_content(&self, content: &str) {
        let mut state = self.state.lock().unwrap();
        state.content = content.to_string();
        state.revision += 1;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

fn sha_for(revision: u64) -> String {
    format!("sha-{}", revision)
}

#[async_trait]
impl ContentClient for FakeRepo {
    async fn fetch_file(&self, _location: &FileLocation) -> Result<RemoteFile> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.fail_fetch {
            return Err(DeployError::RemoteRead { status });
        }

        let file = {
            let state = self.state.lock().unwrap();
            RemoteFile {
                content: state.content.clone(),
                sha: sha_for(state.revision),
            }
        };

        if let Some(barrier) = &self.read_barrier {
            barrier.wait().await;
        }

        Ok(file)
    }

    async fn write_file(&self, _location: &FileLocation, sha: &str, content: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if sha != sha_for(state.revision) {
            return Err(DeployError::RemoteWrite { status: 409 });
        }
        state.content = content.to_string();
        state.revision += 1;
        Ok(())
    }
}

use crate::error::{DeployError, Result};
use crate::github::{Committer, FileLocation};
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "deploy-stamp.toml";

static DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8787";
static DEFAULT_API_BASE: &str = "https://api.github.com";
static DEFAULT_COMMIT_MESSAGE: &str = "chore: auto update README timestamp";
static DEFAULT_COMMITTER_NAME: &str = "deploy-stamp[bot]";
static DEFAULT_COMMITTER_EMAIL: &str = "deploy-stamp@users.noreply.github.com";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

// Everything as it arrives from the file and environment layers, before we
// know whether the required parts are present.
#[derive(Clone, Debug, Deserialize)]
struct RawSettings {
    github_token: Option<String>,
    gh_owner: Option<String>,
    gh_repo: Option<String>,
    gh_branch: Option<String>,
    gh_file_path: Option<String>,
    deploy_token: Option<String>,
    state_dir: Option<String>,

    listen_addr: Option<String>,
    api_base: Option<String>,
    commit_message: Option<String>,
    committer_name: Option<String>,
    committer_email: Option<String>,
    http_timeout_secs: Option<u64>,
}

/// Validated settings for one configured file.
#[derive(Clone, Debug)]
pub struct Settings {
    pub github_token: String,
    pub location: FileLocation,
    pub deploy_token: String,
    /// Root folder of the fs-backed flag store.
    pub state_dir: String,
    pub listen_addr: String,
    pub api_base: String,
    pub commit_message: String,
    pub committer: Committer,
    pub http_timeout: Duration,
}

impl Settings {
    /// Loads settings from an optional TOML file, overridden by the process
    /// environment (`GH_OWNER`, `GITHUB_TOKEN`, ...).
    pub fn load(config_file: &str) -> anyhow::Result<Settings> {
        let source = config::Config::builder()
            .add_source(config::File::with_name(config_file).required(false))
            .add_source(config::Environment::default())
            .build()
            .context("could not read configuration sources")?;

        Ok(Self::from_source(source)?)
    }

    pub fn from_source(source: config::Config) -> Result<Settings> {
        let raw: RawSettings = source.try_deserialize()?;
        raw.validate()
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawSettings {
    fn validate(self) -> Result<Settings> {
        let github_token = present(self.github_token);
        let owner = present(self.gh_owner);
        let repo = present(self.gh_repo);
        let path = present(self.gh_file_path);
        let deploy_token = present(self.deploy_token);
        let state_dir = present(self.state_dir);

        let mut missing = Vec::new();
        for (name, value) in [
            ("github_token", &github_token),
            ("gh_owner", &owner),
            ("gh_repo", &repo),
            ("gh_file_path", &path),
            ("deploy_token", &deploy_token),
            ("state_dir", &state_dir),
        ] {
            if value.is_none() {
                missing.push(name);
            }
        }

        match (github_token, owner, repo, path, deploy_token, state_dir) {
            (
                Some(github_token),
                Some(owner),
                Some(repo),
                Some(path),
                Some(deploy_token),
                Some(state_dir),
            ) => Ok(Settings {
                github_token,
                location: FileLocation {
                    owner,
                    repo,
                    path,
                    branch: present(self.gh_branch),
                },
                deploy_token,
                state_dir,
                listen_addr: present(self.listen_addr)
                    .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
                api_base: present(self.api_base)
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                commit_message: present(self.commit_message)
                    .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string()),
                committer: Committer {
                    name: present(self.committer_name)
                        .unwrap_or_else(|| DEFAULT_COMMITTER_NAME.to_string()),
                    email: present(self.committer_email)
                        .unwrap_or_else(|| DEFAULT_COMMITTER_EMAIL.to_string()),
                },
                http_timeout: Duration::from_secs(
                    self.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
                ),
            }),
            _ => Err(DeployError::ConfigurationMissing(missing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;
    use std::sync::Mutex;

    // Serialises tests that touch process environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn source(pairs: &[(&str, &str)]) -> config::Config {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap()
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            ("github_token", "ghp_test"),
            ("gh_owner", "octo"),
            ("gh_repo", "site"),
            ("gh_file_path", "README.md"),
            ("deploy_token", "s3cret"),
            ("state_dir", "/tmp/state"),
        ]
    }

    #[test]
    fn test_defaults_fill_optional_keys() {
        let settings = Settings::from_source(source(&complete())).unwrap();
        assert_eq!(settings.location.branch, None);
        assert_eq!(settings.listen_addr, "0.0.0.0:8787");
        assert_eq!(settings.api_base, "https://api.github.com");
        assert_eq!(settings.committer.name, "deploy-stamp[bot]");
        assert_eq!(settings.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_branch_is_optional_but_kept() {
        let mut pairs = complete();
        pairs.push(("gh_branch", "main"));
        let settings = Settings::from_source(source(&pairs)).unwrap();
        assert_eq!(settings.location.branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_all_missing_keys_reported() {
        let err = Settings::from_source(source(&[("gh_owner", "octo"), ("gh_repo", "")]))
            .unwrap_err();
        match err {
            DeployError::ConfigurationMissing(missing) => assert_eq!(
                missing,
                vec![
                    "github_token",
                    "gh_repo",
                    "gh_file_path",
                    "deploy_token",
                    "state_dir"
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_environment_overrides_file_and_keeps_values_verbatim() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("deploy-stamp.toml");
        std::fs::write(
            &file,
            r#"
gh_owner = "file-owner"
gh_repo = "site"
gh_file_path = "README.md"
deploy_token = "from-file"
state_dir = "/var/lib/deploy-stamp"
http_timeout_secs = 10
"#,
        )
        .unwrap();

        let vars = [
            ("GH_OWNER", "env-owner"),
            ("GITHUB_TOKEN", "ghp_env"),
            ("DEPLOY_TOKEN", "007123"),
            ("GH_BRANCH", "1.10"),
            ("HTTP_TIMEOUT_SECS", "45"),
        ];
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let loaded = Settings::load(&file.to_string_lossy());
        for (key, _) in vars {
            env::remove_var(key);
        }
        let settings = loaded.unwrap();

        assert_eq!(settings.location.owner, "env-owner");
        assert_eq!(settings.location.repo, "site");
        assert_eq!(settings.github_token, "ghp_env");
        assert_eq!(settings.deploy_token, "007123");
        assert_eq!(settings.location.branch.as_deref(), Some("1.10"));
        assert_eq!(settings.http_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_missing_file_falls_back_to_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");

        let vars = [
            ("GITHUB_TOKEN", "ghp_env"),
            ("GH_OWNER", "0042"),
            ("GH_REPO", "site"),
            ("GH_FILE_PATH", "README.md"),
            ("DEPLOY_TOKEN", "true"),
            ("STATE_DIR", "/tmp/state"),
        ];
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let loaded = Settings::load(&missing.to_string_lossy());
        for (key, _) in vars {
            env::remove_var(key);
        }
        let settings = loaded.unwrap();

        assert_eq!(settings.location.owner, "0042");
        assert_eq!(settings.deploy_token, "true");
        assert_eq!(settings.state_dir, "/tmp/state");
    }
}

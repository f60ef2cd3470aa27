use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use cairn_events::RepoSlug;
use cairn_plugin::RepoConfig;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REPO_CONF_DIR_UPDATE_INTERVAL_S: u64 = 5;

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_github_api_base() -> String {
    DEFAULT_GITHUB_API_BASE.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_update_interval_s() -> u64 {
    DEFAULT_REPO_CONF_DIR_UPDATE_INTERVAL_S
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Service configuration file contents.
pub struct ServiceConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub github_access_token: String,
    #[serde(default = "default_github_api_base")]
    pub github_api_base: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Enables `X-Hub-Signature-256` verification when set.
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub repo_confs: BTreeMap<String, RepoConfig>,
    /// Directory of `owner/repo`-keyed files; polled for changes.
    #[serde(default)]
    pub repo_conf_dir: Option<PathBuf>,
    #[serde(default = "default_update_interval_s")]
    pub repo_conf_dir_update_interval_s: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            log_level: None,
            github_access_token: String::new(),
            github_api_base: default_github_api_base(),
            request_timeout_ms: default_request_timeout_ms(),
            webhook_secret: None,
            repo_confs: BTreeMap::new(),
            repo_conf_dir: None,
            repo_conf_dir_update_interval_s: default_update_interval_s(),
        }
    }
}

impl ServiceConfig {
    /// Static `repo_confs` overlaid with the conf directory, keyed by slug.
    pub fn resolve_repo_configs(&self) -> Result<BTreeMap<RepoSlug, RepoConfig>> {
        let mut merged = self.repo_confs.clone();
        if let Some(dir) = &self.repo_conf_dir {
            merged.extend(load_repo_conf_dir(dir)?);
        }
        parse_repo_confs(merged)
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("toml"))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
}

fn decode_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if is_toml(path) {
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    } else {
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Loads the service configuration; `.toml` files are TOML, anything else JSON.
///
/// A relative `repo_conf_dir` is resolved against the file's directory.
pub fn load_service_config(path: &Path) -> Result<ServiceConfig> {
    let mut config: ServiceConfig = decode_file(path)?;
    if let Some(dir) = &config.repo_conf_dir {
        if dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.repo_conf_dir = Some(parent.join(dir));
            }
        }
    }
    Ok(config)
}

/// Reads every `.json`/`.toml` file of `dir` in name order. Later files win
/// for a repository defined twice.
pub fn load_repo_conf_dir(dir: &Path) -> Result<BTreeMap<String, RepoConfig>> {
    let mut paths = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?
    {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && (is_json(&path) || is_toml(&path)) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut merged = BTreeMap::new();
    for path in paths {
        let confs: BTreeMap<String, RepoConfig> = decode_file(&path)?;
        tracing::debug!(path = %path.display(), repos = confs.len(), "repo conf file loaded");
        merged.extend(confs);
    }
    Ok(merged)
}

pub fn parse_repo_confs(
    raw: BTreeMap<String, RepoConfig>,
) -> Result<BTreeMap<RepoSlug, RepoConfig>> {
    let mut parsed = BTreeMap::new();
    for (key, config) in raw {
        let Some(slug) = RepoSlug::parse(&key) else {
            bail!("invalid repository '{key}', expected owner/repo");
        };
        parsed.insert(slug, config);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use cairn_events::RepoSlug;
    use tempfile::tempdir;

    use super::{load_repo_conf_dir, load_service_config, ServiceConfig, DEFAULT_BIND_ADDR};

    fn write(path: &Path, contents: &str) {
        std::fs::write(path, contents).expect("write fixture");
    }

    #[test]
    fn unit_json_config_applies_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cairn.json");
        write(
            &path,
            r#"{"github_access_token": "t0ken", "repo_confs": {"fatedier/frp": {"roles": {"owner": ["alice"]}}}}"#,
        );

        let config = load_service_config(&path).expect("load config");
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.github_api_base, "https://api.github.com");
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.repo_conf_dir_update_interval_s, 5);
        assert_eq!(config.github_access_token, "t0ken");

        let repos = config.resolve_repo_configs().expect("resolve");
        assert_eq!(
            repos[&RepoSlug::new("fatedier", "frp")].roles["owner"],
            vec!["alice".to_string()]
        );
    }

    #[test]
    fn functional_toml_config_resolves_relative_conf_dir() {
        let dir = tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("repos")).expect("repos dir");
        let path = dir.path().join("cairn.toml");
        write(
            &path,
            r#"
bind_addr = "127.0.0.1:9000"
log_level = "debug"
webhook_secret = "s3cret"
repo_conf_dir = "repos"

[repo_confs."fatedier/frp".plugins.status]
preconditions = [{ is_owner = true }]
"#,
        );

        let config = load_service_config(&path).expect("load config");
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.repo_conf_dir, Some(dir.path().join("repos")));
        let frp = &config.repo_confs["fatedier/frp"];
        assert!(frp.plugins["status"].preconditions[0].is_owner);
    }

    #[test]
    fn functional_conf_dir_overrides_static_entries_in_file_name_order() {
        let dir = tempdir().expect("tempdir");
        write(
            &dir.path().join("a.json"),
            r#"{"fatedier/frp": {"roles": {"owner": ["bob"]}}, "fatedier/other": {}}"#,
        );
        write(
            &dir.path().join("b.toml"),
            r#"
["fatedier/frp"]
roles = "carol"
"#,
        );
        write(&dir.path().join("notes.txt"), "ignored");

        let error = load_repo_conf_dir(dir.path()).expect_err("roles must be a table");
        assert!(error.to_string().contains("b.toml"));

        write(
            &dir.path().join("b.toml"),
            r#"
["fatedier/frp".roles]
owner = ["carol"]
"#,
        );
        let config = ServiceConfig {
            repo_confs: [(
                "fatedier/frp".to_string(),
                serde_json::from_str(r#"{"roles": {"owner": ["alice"]}}"#).expect("repo conf"),
            )]
            .into_iter()
            .collect(),
            repo_conf_dir: Some(dir.path().to_path_buf()),
            ..ServiceConfig::default()
        };

        let repos = config.resolve_repo_configs().expect("resolve");
        assert_eq!(repos.len(), 2);
        assert_eq!(
            repos[&RepoSlug::new("fatedier", "frp")].roles["owner"],
            vec!["carol".to_string()]
        );
    }

    #[test]
    fn regression_invalid_repository_key_is_rejected() {
        let config = ServiceConfig {
            repo_confs: [("frp".to_string(), Default::default())]
                .into_iter()
                .collect(),
            ..ServiceConfig::default()
        };
        let error = config.resolve_repo_configs().expect_err("missing owner");
        assert_eq!(
            error.to_string(),
            "invalid repository 'frp', expected owner/repo"
        );
    }
}

//! Engine tuning and remote connection settings.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tollpass_remote::Credentials;
use tollpass_store::DEFAULT_COST_PER_PASSAGE;
use zeroize::Zeroizing;

/// Label prepended to names of remote-originated passes unless configured
/// otherwise.
pub const DEFAULT_LABEL_PREFIX: &str = "[DISTANT]";

/// Remote resource holding subscription passes.
pub const DEFAULT_RESOURCE: &str = "subscription.pass";

/// Age after which a linked local pass is pushed again by a batch.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(5 * 60);

/// Tuning for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote resource name.
    pub resource: String,
    /// Staleness threshold for batch pushes.
    pub staleness: Duration,
    /// Cost per passage for passes created by a pull.
    pub default_cost_per_passage: i64,
    /// Whether ledger mutations push the touched pass right away.
    pub auto_push: bool,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            resource: DEFAULT_RESOURCE.to_string(),
            staleness: DEFAULT_STALENESS,
            default_cost_per_passage: DEFAULT_COST_PER_PASSAGE,
            auto_push: true,
        }
    }

    /// Sets the remote resource name.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Sets the staleness threshold.
    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    /// Sets the cost per passage given to pulled passes.
    pub fn with_default_cost_per_passage(mut self, cost: i64) -> Self {
        self.default_cost_per_passage = cost;
        self
    }

    /// Enables or disables pushing from ledger mutations.
    pub fn with_auto_push(mut self, auto_push: bool) -> Self {
        self.auto_push = auto_push;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Oldest `last_sync_at` that is still fresh at `now`.
pub(crate) fn stale_cutoff(now: DateTime<Utc>, staleness: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(staleness)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Connection settings for the remote peer.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Base URL of the peer.
    pub endpoint: String,
    /// Database name.
    pub database: String,
    /// Login of the sync user.
    pub login: String,
    password: Zeroizing<String>,
    label_prefix: Option<String>,
}

impl RemoteConfig {
    /// Creates settings with the default label prefix.
    pub fn new(
        endpoint: impl Into<String>,
        database: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            login: login.into(),
            password: Zeroizing::new(password.into()),
            label_prefix: Some(DEFAULT_LABEL_PREFIX.to_string()),
        }
    }

    /// Sets the label prefix; `None` or an empty string disables labelling.
    pub fn with_label_prefix(mut self, prefix: Option<String>) -> Self {
        self.label_prefix = prefix;
        self
    }

    /// Label prefix for remote-originated names, if any.
    pub fn label_prefix(&self) -> Option<&str> {
        self.label_prefix
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Checks that every connection field is present.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] naming the first missing field.
    pub fn validate(&self) -> SyncResult<()> {
        let fields = [
            ("endpoint", self.endpoint.as_str()),
            ("database", self.database.as_str()),
            ("login", self.login.as_str()),
            ("password", self.password.as_str()),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(SyncError::Configuration(format!("remote {name} is not set")));
        }

        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(SyncError::Configuration(format!(
                "remote endpoint must be an http(s) URL: {endpoint}"
            )));
        }
        Ok(())
    }

    /// Login parameters for the link.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.database.trim(),
            self.login.trim(),
            self.password.as_str(),
        )
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("label_prefix", &self.label_prefix)
            .finish()
    }
}

/// Supplies remote connection settings.
///
/// Resolved once at the start of every sync cycle, so edits take effect on
/// the next cycle without restarting anything.
pub trait ConfigSource: Send + Sync {
    /// Returns the current settings.
    fn resolve(&self) -> SyncResult<RemoteConfig>;
}

/// Fixed settings, or none at all.
#[derive(Debug, Clone)]
pub struct StaticConfig {
    config: Option<RemoteConfig>,
}

impl StaticConfig {
    /// Always resolves to `config`.
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config: Some(config),
        }
    }

    /// Never resolves; every sync fails with a configuration error.
    pub fn unconfigured() -> Self {
        Self { config: None }
    }
}

impl ConfigSource for StaticConfig {
    fn resolve(&self) -> SyncResult<RemoteConfig> {
        self.config
            .clone()
            .ok_or_else(|| SyncError::Configuration("remote connection is not configured".into()))
    }
}

#[derive(Deserialize)]
struct RawRemoteConfig {
    endpoint: Option<String>,
    database: Option<String>,
    login: Option<String>,
    password: Option<String>,
    label_prefix: Option<String>,
}

/// Settings read from a JSON file on every resolve.
///
/// ```json
/// {
///   "endpoint": "https://peer.example",
///   "database": "tolls",
///   "login": "sync",
///   "password": "secret",
///   "label_prefix": "[DISTANT]"
/// }
/// ```
///
/// A missing `label_prefix` means the default; an empty one disables it.
#[derive(Debug, Clone)]
pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    /// Reads settings from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for JsonFileConfig {
    fn resolve(&self) -> SyncResult<RemoteConfig> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            SyncError::Configuration(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let raw: RawRemoteConfig = serde_json::from_slice(&bytes).map_err(|e| {
            SyncError::Configuration(format!("invalid {}: {e}", self.path.display()))
        })?;
        let password = Zeroizing::new(raw.password.unwrap_or_default());

        Ok(RemoteConfig::new(
            raw.endpoint.unwrap_or_default(),
            raw.database.unwrap_or_default(),
            raw.login.unwrap_or_default(),
            password.as_str(),
        )
        .with_label_prefix(Some(
            raw.label_prefix
                .unwrap_or_else(|| DEFAULT_LABEL_PREFIX.to_string()),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn remote() -> RemoteConfig {
        RemoteConfig::new("https://peer.example", "tolls", "sync", "secret")
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.resource, "subscription.pass");
        assert_eq!(config.staleness, Duration::from_secs(300));
        assert_eq!(config.default_cost_per_passage, 500);
        assert!(config.auto_push);
    }

    #[test]
    fn builder_overrides() {
        let config = SyncConfig::new()
            .with_resource("toll.pass")
            .with_staleness(Duration::from_secs(60))
            .with_auto_push(false);
        assert_eq!(config.resource, "toll.pass");
        assert_eq!(config.staleness, Duration::from_secs(60));
        assert!(!config.auto_push);
    }

    #[test]
    fn stale_cutoff_subtracts_threshold() {
        let now = Utc::now();
        let cutoff = stale_cutoff(now, Duration::from_secs(300));
        assert_eq!(now - cutoff, chrono::Duration::seconds(300));
    }

    #[test]
    fn validate_names_missing_field() {
        assert!(remote().validate().is_ok());

        let err = RemoteConfig::new("https://peer", "tolls", "  ", "secret")
            .validate()
            .unwrap_err();
        assert!(matches!(err, SyncError::Configuration(ref m) if m.contains("login")));

        let err = RemoteConfig::new("peer.example", "tolls", "sync", "secret")
            .validate()
            .unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
    }

    #[test]
    fn label_prefix_defaults_and_disables() {
        assert_eq!(remote().label_prefix(), Some("[DISTANT]"));
        assert_eq!(remote().with_label_prefix(None).label_prefix(), None);
        assert_eq!(
            remote().with_label_prefix(Some(String::new())).label_prefix(),
            None
        );
    }

    #[test]
    fn debug_hides_password() {
        let text = format!("{:?}", remote());
        assert!(!text.contains("secret"));
        assert_eq!(remote().credentials().password.as_str(), "secret");
    }

    #[test]
    fn unconfigured_source_fails() {
        let err = StaticConfig::unconfigured().resolve().unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
        assert!(StaticConfig::new(remote()).resolve().is_ok());
    }

    #[test]
    fn json_file_is_read_on_each_resolve() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"endpoint":"https://peer","database":"tolls","login":"sync","password":"pw"}}"#
        )
        .unwrap();
        let source = JsonFileConfig::new(file.path());

        let config = source.resolve().unwrap();
        assert_eq!(config.endpoint, "https://peer");
        assert_eq!(config.label_prefix(), Some("[DISTANT]"));

        std::fs::write(
            file.path(),
            r#"{"endpoint":"https://other","database":"tolls","login":"sync","password":"pw","label_prefix":""}"#,
        )
        .unwrap();
        let config = source.resolve().unwrap();
        assert_eq!(config.endpoint, "https://other");
        assert_eq!(config.label_prefix(), None);
    }

    #[test]
    fn json_file_errors_are_configuration() {
        let source = JsonFileConfig::new("/nonexistent/tollpass/remote.json");
        assert!(matches!(source.resolve(), Err(SyncError::Configuration(_))));

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "not json").unwrap();
        let source = JsonFileConfig::new(file.path());
        assert!(matches!(source.resolve(), Err(SyncError::Configuration(_))));
    }

    #[test]
    fn json_file_with_missing_fields_fails_validation() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"endpoint":"https://peer"}"#).unwrap();
        let config = JsonFileConfig::new(file.path()).resolve().unwrap();
        assert!(matches!(config.validate(), Err(SyncError::Configuration(_))));
    }
}

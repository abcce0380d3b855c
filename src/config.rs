//! Configuration management for the visit counter.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, VisitsError};

/// Prefix for environment variable overrides, e.g. `VISITS__STORE__ENDPOINT`.
const ENV_PREFIX: &str = "VISITS";

/// Path of the health endpoint, mounted alongside the visit route.
pub const HEALTH_ROUTE: &str = "/health";

/// Main configuration for the visit counter service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisitsConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Key-value store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Page rendering configuration
    #[serde(default)]
    pub page: PageConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Path of the visit counting endpoint
    #[serde(default = "default_route")]
    pub route: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            route: default_route(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_route() -> String {
    "/home".to_string()
}

/// Which store implementation backs the counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

/// Key-value store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store implementation
    #[serde(default)]
    pub backend: StoreBackend,

    /// Store endpoint as `host:port`
    #[serde(default = "default_store_endpoint")]
    pub endpoint: String,

    /// Logical database index
    #[serde(default)]
    pub db: i64,

    /// Optional password for AUTH
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            endpoint: default_store_endpoint(),
            db: 0,
            password: None,
        }
    }
}

fn default_store_endpoint() -> String {
    "localhost:6379".to_string()
}

/// Page rendering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageConfig {
    /// HTML template file; the built-in page is used when unset
    #[serde(default)]
    pub template_path: Option<PathBuf>,

    /// Re-read the template file on every request
    #[serde(default)]
    pub reload: bool,
}

impl VisitsConfig {
    /// Load configuration from an optional YAML file plus `VISITS__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Yaml));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        config.validate()
    }

    /// Reject values the router would refuse at startup.
    fn validate(self) -> Result<Self> {
        let route = &self.server.route;
        if !route.starts_with('/') {
            return Err(VisitsError::Config(format!(
                "server.route must start with '/', got {:?}",
                route
            )));
        }
        if route == HEALTH_ROUTE {
            return Err(VisitsError::Config(format!(
                "server.route cannot be {}",
                HEALTH_ROUTE
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VisitsConfig::default();
        assert_eq!(config.server.http_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.server.route, "/home");
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.endpoint, "localhost:6379");
        assert_eq!(config.store.db, 0);
        assert!(config.store.password.is_none());
        assert!(config.page.template_path.is_none());
        assert!(!config.page.reload);
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
store:
  endpoint: "redis.internal:6380"
"#;
        let config = VisitsConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store.endpoint, "redis.internal:6380");
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.server.route, "/home");
    }

    #[test]
    fn test_from_yaml_full() {
        let yaml = r#"
server:
  http_addr: "127.0.0.1:9000"
  route: "/visits"
store:
  backend: memory
  endpoint: "cache:6379"
  db: 2
  password: "secret"
page:
  template_path: "/srv/index.html"
  reload: true
"#;
        let config = VisitsConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.http_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.server.route, "/visits");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.db, 2);
        assert_eq!(config.store.password.as_deref(), Some("secret"));
        assert_eq!(
            config.page.template_path.as_deref(),
            Some(Path::new("/srv/index.html"))
        );
        assert!(config.page.reload);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_backend() {
        let yaml = r#"
store:
  backend: etcd
"#;
        assert!(VisitsConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_route_rejected() {
        for route in ["home", "", "/health"] {
            let yaml = format!("server:\n  route: {:?}\n", route);
            assert!(
                matches!(VisitsConfig::from_yaml(&yaml), Err(VisitsError::Config(_))),
                "route {:?} should be rejected",
                route
            );
        }
        assert!(VisitsConfig::from_yaml("server:\n  route: \"/visits\"\n").is_ok());
    }

    #[test]
    fn test_load_file_then_env() {
        let path = std::env::temp_dir().join(format!(
            "visit-counter-config-{}.yaml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "server:\n  route: \"/count\"\nstore:\n  endpoint: \"file-host:6379\"\n  db: 4\n",
        )
        .unwrap();

        std::env::set_var("VISITS__STORE__ENDPOINT", "env-host:6380");
        std::env::set_var("VISITS__STORE__PASSWORD", "1234");
        let loaded = VisitsConfig::load(Some(&path));
        std::env::remove_var("VISITS__STORE__ENDPOINT");
        std::env::remove_var("VISITS__STORE__PASSWORD");
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        // Environment wins over the file, the file over defaults
        assert_eq!(config.store.endpoint, "env-host:6380");
        assert_eq!(config.store.db, 4);
        assert_eq!(config.server.route, "/count");
        assert_eq!(config.server.http_addr, default_http_addr());
        // A numeric-looking password still loads as a string
        assert_eq!(config.store.password.as_deref(), Some("1234"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let path = Path::new("/nonexistent/visit-counter/config.yaml");
        assert!(matches!(
            VisitsConfig::load(Some(path)),
            Err(VisitsError::Config(_))
        ));
    }
}

use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{Error, Result};

/// Which persistence backend a [`FeatureStore`] wraps.
///
/// [`FeatureStore`]: crate::FeatureStore
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// The embedded single-file store. The config value is `"bolt"`, kept
    /// for compatibility with existing deployment configs.
    Bolt,
    /// The external Redis-backed store.
    Redis,
}

/// One named environment out of a flipadelphia config file.
///
/// The store layer receives this struct already parsed; it never reads
/// environment variables or files itself.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub environment_name: String,
    pub persistence_store_type: StoreKind,
    #[serde(default)]
    pub db_file: PathBuf,
    #[serde(default)]
    pub redis_host: String,
    #[serde(default)]
    pub redis_password: String,
    #[serde(default)]
    pub redis_db: i64,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(rename = "port")]
    pub listen_on_port: u16,
    #[serde(default)]
    pub auth_url: String,
    #[serde(default)]
    pub auth_method: String,
    #[serde(default)]
    pub auth_header: String,
    #[serde(default)]
    pub auth_success_status: String,
}

impl Config {
    /// Load the config for a named environment from a flipadelphia config
    /// file: a JSON object mapping environment names to configurations.
    ///
    /// The config file path can be relative or absolute. An absolute path is
    /// used as-is, a path starting with `./` is resolved against the current
    /// directory, and a bare file name is resolved against
    /// `$HOME/.flipadelphia`.
    pub fn from_file(config_path: &str, environment: &str) -> Result<Config> {
        let path = full_file_path(config_path)?;
        let data = fs::read_to_string(&path)?;
        let mut environments: HashMap<String, Config> = serde_json::from_str(&data)?;
        let mut config = environments.remove(environment).ok_or_else(|| {
            Error::Config(format!(
                "runtime environment {environment:?} not found in {config_path:?}"
            ))
        })?;
        config.environment_name = environment.to_owned();
        config.db_file = resolve_data_path(&config.db_file)?;
        config.log_file = match config.log_file {
            Some(log_file) => Some(resolve_data_path(&log_file)?),
            None => None,
        };
        Ok(config)
    }
}

/// Resolve a possibly-relative config file path. Bare names live under
/// `$HOME/.flipadelphia`.
fn full_file_path(path: &str) -> Result<PathBuf> {
    let path = Path::new(path);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else if path.starts_with("./") {
        Ok(env::current_dir()?.join(path))
    } else {
        Ok(stored_file_dir()?.join(path))
    }
}

fn resolve_data_path(path: &Path) -> Result<PathBuf> {
    match path.to_str() {
        Some("") => Ok(path.to_path_buf()),
        Some(s) => full_file_path(s),
        None => Ok(path.to_path_buf()),
    }
}

fn stored_file_dir() -> Result<PathBuf> {
    let home = env::var("HOME").map_err(|_| Error::Config("$HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".flipadelphia"))
}

#[cfg(test)]
mod tests {
    use super::{Config, StoreKind};

    const CONFIG_DATA: &str = r#"{
        "development": {
            "persistence_store_type": "bolt",
            "db_file": "/tmp/flipadelphia.db",
            "port": 3006
        },
        "production": {
            "persistence_store_type": "redis",
            "redis_host": "127.0.0.1:6379",
            "redis_password": "hunter2",
            "redis_db": 3,
            "port": 8080
        }
    }"#;

    fn parse(environment: &str) -> Config {
        let mut environments: std::collections::HashMap<String, Config> =
            serde_json::from_str(CONFIG_DATA).unwrap();
        let mut config = environments.remove(environment).unwrap();
        config.environment_name = environment.to_owned();
        config
    }

    #[test]
    fn test_bolt_environment_parses() {
        let config = parse("development");
        assert_eq!(config.persistence_store_type, StoreKind::Bolt);
        assert_eq!(config.db_file.to_str(), Some("/tmp/flipadelphia.db"));
        assert_eq!(config.listen_on_port, 3006);
    }

    #[test]
    fn test_redis_environment_parses() {
        let config = parse("production");
        assert_eq!(config.persistence_store_type, StoreKind::Redis);
        assert_eq!(config.redis_host, "127.0.0.1:6379");
        assert_eq!(config.redis_password, "hunter2");
        assert_eq!(config.redis_db, 3);
    }

    #[test]
    fn test_absent_fields_default() {
        let config = parse("development");
        assert!(config.redis_host.is_empty());
        assert!(config.auth_url.is_empty());
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_unknown_store_kind_is_rejected() {
        let result: Result<std::collections::HashMap<String, Config>, _> = serde_json::from_str(
            r#"{"test": {"persistence_store_type": "dynamo", "port": 1}}"#,
        );
        assert!(result.is_err());
    }
}

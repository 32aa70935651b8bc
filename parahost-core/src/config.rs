use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;

use crate::fabric::ThreadLevel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub driver: DriverConfig,

    #[serde(default)]
    pub fabric: FabricConfig,

    #[serde(default)]
    pub subsystems: SubsystemConfig,

    #[serde(default)]
    pub kernels: KernelConfig,

    #[serde(default = "default_shutdown_timeout", with = "duration_ms")]
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Driver module imported at startup.
    #[serde(default = "default_driver_module")]
    pub module: String,

    /// Function called with no arguments once the module is imported.
    #[serde(default = "default_entry")]
    pub entry: String,

    /// Name under which the native operation table is importable.
    #[serde(default = "default_native_module")]
    pub native_module: String,

    #[serde(default = "default_search_paths")]
    pub search_paths: Vec<PathBuf>,

    #[serde(default = "default_max_script_bytes")]
    pub max_script_bytes: usize,

    /// Driver function calls that may be active at once.
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,

    /// In a multi-rank world, only the coordinator reads module sources and
    /// broadcasts them to the other ranks.
    #[serde(default = "default_broadcast_imports")]
    pub broadcast_imports: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            module: default_driver_module(),
            entry: default_entry(),
            native_module: default_native_module(),
            search_paths: default_search_paths(),
            max_script_bytes: default_max_script_bytes(),
            max_call_depth: default_max_call_depth(),
            broadcast_imports: default_broadcast_imports(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    #[serde(default = "default_world_size")]
    pub world_size: usize,

    /// Overrides the thread level derived from the capability flags.
    #[serde(default)]
    pub thread_level: Option<ThreadLevel>,

    /// Level granted by the in-process fabric; defaults to whatever is requested.
    #[serde(default)]
    pub granted_thread_level: Option<ThreadLevel>,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            world_size: default_world_size(),
            thread_level: None,
            granted_thread_level: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemConfig {
    /// API version reported by the linked eigensolver library.
    #[serde(default = "default_eigensolver_api_version")]
    pub eigensolver_api_version: u32,
}

impl Default for SubsystemConfig {
    fn default() -> Self {
        Self {
            eigensolver_api_version: default_eigensolver_api_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    #[serde(default = "default_xc_version")]
    pub xc_version: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            xc_version: default_xc_version(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            driver: DriverConfig::default(),
            fabric: FabricConfig::default(),
            subsystems: SubsystemConfig::default(),
            kernels: KernelConfig::default(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl HostConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        from_file(path)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> Result<T, ConfigError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, ConfigError> {
    let config = serde_json::from_str(s)?;
    Ok(config)
}

fn default_driver_module() -> String {
    "driver".to_string()
}
fn default_entry() -> String {
    "main".to_string()
}
fn default_native_module() -> String {
    "_parahost".to_string()
}
fn default_search_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}
fn default_max_script_bytes() -> usize {
    512 * 1024
}
fn default_max_call_depth() -> usize {
    64
}
fn default_broadcast_imports() -> bool {
    true
}
fn default_world_size() -> usize {
    1
}
fn default_eigensolver_api_version() -> u32 {
    crate::subsystem::EIGENSOLVER_MIN_API_VERSION
}
fn default_xc_version() -> String {
    "5.1.0".to_string()
}
fn default_shutdown_timeout() -> Duration {
    Duration::from_millis(5000)
}

pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_config_serde() {
        let config = HostConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        tracing::debug!("{}", json);
        let deserialized: HostConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(format!("{:?}", config), format!("{:?}", deserialized));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: HostConfig = from_str(
            r#"{"driver": {"module": "gs"}, "fabric": {"world_size": 4, "thread_level": "multiple"}}"#,
        )
        .unwrap();
        assert_eq!(config.driver.module, "gs");
        assert_eq!(config.driver.entry, "main");
        assert!(config.driver.broadcast_imports);
        assert_eq!(config.driver.max_call_depth, 64);
        assert_eq!(config.fabric.world_size, 4);
        assert_eq!(config.fabric.thread_level, Some(ThreadLevel::Multiple));
        assert_eq!(config.fabric.granted_thread_level, None);
        assert_eq!(config.shutdown_timeout, Duration::from_millis(5000));
        assert_eq!(config.subsystems.eigensolver_api_version, 20171201);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"shutdown_timeout": 250}"#).unwrap();
        let config = HostConfig::from_file(&path).unwrap();
        assert_eq!(config.shutdown_timeout, Duration::from_millis(250));

        assert!(matches!(
            HostConfig::from_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}

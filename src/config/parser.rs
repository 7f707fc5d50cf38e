use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Launch configuration for the supervised server process.
///
/// This structure defines how to start the game server: the executable, the
/// fixed argument list and the working directory the server keeps its worlds in.
///
/// # Examples
///
/// Explicit configuration:
///
/// ```
/// use mc_runner::config::ServerConfig;
/// use std::collections::HashMap;
/// use std::path::PathBuf;
///
/// let server_config = ServerConfig {
///     command: "java".to_string(),
///     args: vec!["-jar".to_string(), "server.jar".to_string(), "-nogui".to_string()],
///     working_dir: PathBuf::from("/srv/minecraft"),
///     env: HashMap::new(),
/// };
/// ```
///
/// The conventional Java launch:
///
/// ```
/// use mc_runner::config::ServerConfig;
///
/// let server_config = ServerConfig::java("1G", "3G", "server.jar");
/// assert_eq!(server_config.args, vec!["-Xms1G", "-Xmx3G", "-jar", "server.jar", "-nogui"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Executable to run. Either an absolute path or a command available in the PATH.
    pub command: String,

    /// Command-line arguments passed to the server.
    #[serde(default)]
    pub args: Vec<String>,

    /// Directory the server is started in.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Environment variables added on top of the current environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ServerConfig {
    /// Builds the `java -Xms<min> -Xmx<max> -jar <jar> -nogui` launch in the current directory.
    pub fn java(min_ram: &str, max_ram: &str, jar: impl Into<String>) -> Self {
        Self {
            command: "java".to_string(),
            args: vec![
                format!("-Xms{}", min_ram),
                format!("-Xmx{}", max_ram),
                "-jar".to_string(),
                jar.into(),
                "-nogui".to_string(),
            ],
            working_dir: default_working_dir(),
            env: HashMap::new(),
        }
    }
}

/// One checkpoint of the graceful-stop countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownStep {
    /// Seconds left announced to players at this checkpoint.
    pub remaining_secs: u32,
    /// Pause before the next checkpoint (or before `stop` after the last one).
    pub wait_ms: u64,
}

impl CountdownStep {
    /// Pause after this checkpoint.
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

/// Graceful shutdown settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownConfig {
    /// Countdown checkpoints, announced in order.
    #[serde(default = "default_countdown")]
    pub countdown: Vec<CountdownStep>,

    /// Upper bound on waiting for the process to exit after `stop`.
    /// When it elapses the process is killed. `None` waits forever.
    #[serde(default)]
    pub exit_timeout_secs: Option<u64>,
}

impl ShutdownConfig {
    /// Exit timeout as a `Duration`, if configured.
    pub fn exit_timeout(&self) -> Option<Duration> {
        self.exit_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            countdown: default_countdown(),
            exit_timeout_secs: None,
        }
    }
}

/// Backup settings: what to snapshot, where to stage it and how many archives to keep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupConfig {
    /// Directories to snapshot. Missing ones are skipped.
    #[serde(default = "default_sources")]
    pub sources: Vec<PathBuf>,

    /// Scratch directory the snapshot is assembled in.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Directory holding the dated archives.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Retention cap. Reaching it evicts the oldest archive, one per backup.
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
}

impl BackupConfig {
    /// Returns a copy with every relative path joined onto `base`.
    pub fn resolve_against(&self, base: &Path) -> Self {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };

        Self {
            sources: self.sources.iter().map(resolve).collect(),
            staging_dir: resolve(&self.staging_dir),
            backup_dir: resolve(&self.backup_dir),
            max_backups: self.max_backups,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            staging_dir: default_staging_dir(),
            backup_dir: default_backup_dir(),
            max_backups: default_max_backups(),
        }
    }
}

/// Main configuration for MC Runner.
///
/// # JSON Schema
///
/// ```json
/// {
///   "server": {
///     "command": "java",
///     "args": ["-Xms1G", "-Xmx3G", "-jar", "server.jar", "-nogui"],
///     "workingDir": "/srv/minecraft"
///   },
///   "shutdown": {
///     "countdown": [{ "remainingSecs": 10, "waitMs": 10000 }],
///     "exitTimeoutSecs": 120
///   },
///   "backup": {
///     "sources": ["world", "world_nether", "world_the_end"],
///     "stagingDir": ".temp",
///     "backupDir": "backups",
///     "maxBackups": 3
///   },
///   "playerPollSecs": 60
/// }
/// ```
///
/// Only `server` is required; every other section falls back to its defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// How to launch the server.
    pub server: ServerConfig,

    /// Graceful shutdown settings.
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Backup settings. Relative paths are resolved against `server.working_dir`.
    #[serde(default)]
    pub backup: BackupConfig,

    /// Period of the `list` poll that resyncs the player roster. Disabled when absent.
    #[serde(default)]
    pub player_poll_secs: Option<u64>,

    /// Ring size of the event bus.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Config {
    /// Creates a configuration with default shutdown and backup settings.
    pub fn new(server: ServerConfig) -> Self {
        Self {
            server,
            shutdown: ShutdownConfig::default(),
            backup: BackupConfig::default(),
            player_poll_secs: None,
            event_capacity: default_event_capacity(),
        }
    }

    /// Loads a configuration from a file path.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be read
    /// * The file contents are not valid JSON/YAML
    /// * The document does not conform to the expected schema
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::parse_from_yaml_str(&content),
            _ => Self::parse_from_str(&content),
        }
    }

    /// Parses a configuration from a JSON string.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Parses a configuration from a YAML string.
    pub fn parse_from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse YAML config: {}", e)))
    }

    /// Player poll period as a `Duration`, if configured.
    pub fn player_poll_interval(&self) -> Option<Duration> {
        self.player_poll_secs.map(Duration::from_secs)
    }
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_countdown() -> Vec<CountdownStep> {
    [(30, 15), (15, 5), (10, 5), (5, 1), (4, 1), (3, 1), (2, 1), (1, 1)]
        .into_iter()
        .map(|(remaining_secs, wait_secs)| CountdownStep {
            remaining_secs,
            wait_ms: wait_secs * 1000,
        })
        .collect()
}

fn default_sources() -> Vec<PathBuf> {
    ["world", "world_nether", "world_the_end"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from(".temp")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_max_backups() -> usize {
    3
}

fn default_event_capacity() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config_str = r#"{
            "server": {
                "command": "java",
                "args": ["-Xms1G", "-Xmx3G", "-jar", "server.jar", "-nogui"]
            }
        }"#;

        let config = Config::parse_from_str(config_str).unwrap();

        assert_eq!(config.server.command, "java");
        assert_eq!(config.server.working_dir, PathBuf::from("."));
        assert_eq!(config.shutdown.countdown.len(), 8);
        assert_eq!(config.shutdown.countdown[0].remaining_secs, 30);
        assert_eq!(config.shutdown.countdown[0].wait(), Duration::from_secs(15));
        assert_eq!(config.backup.max_backups, 3);
        assert_eq!(config.backup.sources.len(), 3);
        assert!(config.player_poll_secs.is_none());
    }

    #[test]
    fn test_resolve_backup_paths() {
        let backup = BackupConfig {
            sources: vec![PathBuf::from("world"), PathBuf::from("/abs/world_nether")],
            ..BackupConfig::default()
        };

        let resolved = backup.resolve_against(Path::new("/srv/mc"));

        assert_eq!(resolved.sources[0], PathBuf::from("/srv/mc/world"));
        assert_eq!(resolved.sources[1], PathBuf::from("/abs/world_nether"));
        assert_eq!(resolved.backup_dir, PathBuf::from("/srv/mc/backups"));
        assert_eq!(resolved.staging_dir, PathBuf::from("/srv/mc/.temp"));
    }
}

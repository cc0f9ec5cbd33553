use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{ExitCodes, RestartPolicy};
use crate::error::SupervisorError;
use crate::process::WorkerCommand;
use crate::watcher::ExtensionFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub worker: WorkerConfig,
    pub exit_codes: ExitCodes,
    pub policy: RestartPolicy,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    pub supervised_env: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["-m".to_string(), "worker".to_string()],
            cwd: PathBuf::from("."),
            env: BTreeMap::new(),
            supervised_env: Some("RESTARTD_SUPERVISED".to_string()),
        }
    }
}

impl WorkerConfig {
    pub fn command(&self) -> WorkerCommand {
        let mut cmd = WorkerCommand::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd);
        for (key, value) in &self.env {
            cmd = cmd.env(key, value);
        }
        if let Some(key) = &self.supervised_env {
            cmd = cmd.supervised_env(key);
        }
        cmd
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub extensions: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("worker"),
            extensions: vec!["py".to_string()],
        }
    }
}

impl WatchConfig {
    pub fn filter(&self) -> ExtensionFilter {
        ExtensionFilter::new(&self.extensions)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            log_file: None,
            worker: WorkerConfig::default(),
            exit_codes: ExitCodes::default(),
            policy: RestartPolicy::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain.
    ///
    /// Returns the config and the file it came from (`None` for defaults).
    /// A config file that exists but cannot be read, parsed or validated is
    /// an error rather than a silent fall back to defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            let config =
                Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()))?;
            return Ok((config, Some(path.clone())));
        }

        let project_name = env!("CARGO_PKG_NAME");
        let mut candidates = Vec::new();

        // Primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(project_name).join(format!("{}.yml", project_name)));
        }

        // Fallback location: ./<project>.yml
        candidates.push(PathBuf::from(format!("{}.yml", project_name)));

        match Self::load_first(&candidates)? {
            Some((config, path)) => Ok((config, Some(path))),
            // No config file found, use defaults
            None => Ok((Self::default(), None)),
        }
    }

    /// Load the first candidate that exists
    fn load_first(candidates: &[PathBuf]) -> Result<Option<(Self, PathBuf)>> {
        for path in candidates {
            if path.exists() {
                let config =
                    Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()))?;
                return Ok(Some((config, path.clone())));
            }
        }
        Ok(None)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        Ok(config)
    }

    /// Reject settings the supervisor cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.worker.program.trim().is_empty() {
            return Err(SupervisorError::Config("worker.program must not be empty".to_string()));
        }
        if self.exit_codes.clean == self.exit_codes.restart {
            return Err(SupervisorError::Config(format!(
                "exit_codes.clean and exit_codes.restart must differ (both {})",
                self.exit_codes.clean
            )));
        }
        if self.policy.backoff_unit_ms == 0 {
            return Err(SupervisorError::Config(
                "policy.backoff_unit_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Watch directory, resolved against the worker's working directory
    pub fn watch_dir(&self) -> PathBuf {
        if self.watch.dir.is_absolute() {
            self.watch.dir.clone()
        } else {
            self.worker.cwd.join(&self.watch.dir)
        }
    }
}

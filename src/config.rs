use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::IcaError;
use crate::icav2::{Icav2Cli, default_executable};

pub const CONFIG_FILE_NAME: &str = "icav2-fetch.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub executable: Option<Utf8PathBuf>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub target_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub executable: Option<Utf8PathBuf>,
    pub timeout_secs: Option<u64>,
    pub target_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub executable: PathBuf,
    pub timeout: Option<Duration>,
    pub target_dir: Option<Utf8PathBuf>,
}

impl ResolvedConfig {
    pub fn workspace(&self) -> Icav2Cli {
        let cli = Icav2Cli::new(&self.executable).with_timeout(self.timeout);
        match &self.target_dir {
            Some(dir) => cli.with_target_dir(dir.as_std_path()),
            None => cli,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, IcaError> {
        let config = match path {
            Some(path) => Self::load(PathBuf::from(path))?,
            None => match Self::discover() {
                Some(found) => Self::load(found)?,
                None => Config::default(),
            },
        };
        Ok(Self::resolve_config(config, overrides))
    }

    pub fn resolve_config(config: Config, overrides: ConfigOverrides) -> ResolvedConfig {
        let executable = overrides
            .executable
            .or(config.executable)
            .map(Utf8PathBuf::into_std_path_buf)
            .unwrap_or_else(default_executable);
        let timeout = overrides
            .timeout_secs
            .or(config.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        ResolvedConfig {
            executable,
            timeout,
            target_dir: overrides.target_dir.or(config.target_dir),
        }
    }

    fn load(path: PathBuf) -> Result<Config, IcaError> {
        let content = fs::read_to_string(&path).map_err(|_| IcaError::ConfigRead(path.clone()))?;
        serde_json::from_str(&content).map_err(|err| IcaError::ConfigParse(err.to_string()))
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "icav2-fetch")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .filter(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_file() {
        let config = Config {
            executable: Some(Utf8PathBuf::from("/opt/ica/icav2")),
            timeout_secs: Some(600),
            target_dir: Some(Utf8PathBuf::from("downloads")),
        };
        let overrides = ConfigOverrides {
            timeout_secs: Some(30),
            ..ConfigOverrides::default()
        };

        let resolved = ConfigLoader::resolve_config(config, overrides);
        assert_eq!(resolved.executable, PathBuf::from("/opt/ica/icav2"));
        assert_eq!(resolved.timeout, Some(Duration::from_secs(30)));
        assert_eq!(resolved.target_dir, Some(Utf8PathBuf::from("downloads")));
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let config = Config {
            timeout_secs: Some(0),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config, ConfigOverrides::default());
        assert_eq!(resolved.timeout, None);
    }
}

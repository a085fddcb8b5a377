use anyhow::{Context, Result};
use log::*;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const CONFIG_PATH: &str = "~/.tokensight.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star_prompted: Option<bool>,
}

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn open() -> Result<Self> {
        let path = shellexpand::full(CONFIG_PATH)
            .with_context(|| format!("Config file path {} is invalid", CONFIG_PATH))?;
        Ok(Self {
            path: PathBuf::from(path.as_ref()),
        })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // A config that cannot be read or parsed is the same as an empty one.
    // The first read creates the file so users can edit it by hand.
    pub fn load(&self) -> Config {
        match read_if_found(&self.path) {
            Ok(Some(contents)) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring unparseable config file: {}", e);
                Config::default()
            }),
            Ok(None) => {
                let config = Config::default();
                if let Err(e) = self.save(&config) {
                    debug!("Could not create default config file: {}", e);
                }
                config
            }
            Err(e) => {
                warn!("Ignoring unreadable config file: {}", e);
                Config::default()
            }
        }
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Error ensuring path {:?} exists", parent))?;
        }
        let contents = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, contents).with_context(|| "Error writing config file")
    }
}

fn read_if_found(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(c) => Ok(Some(c)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

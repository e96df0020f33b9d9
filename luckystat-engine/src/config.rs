use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::auto_refresh::DEFAULT_PER_STRATEGY;
use crate::schedule::RefreshAt;
use crate::strategy::MAX_REPEAT;

pub const DEFAULT_CONFIG_FILE: &str = "luckystat.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: Option<PathBuf>,
    pub refresh: RefreshAt,
    pub auto_per_strategy: usize,
    pub default_repeat: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            refresh: RefreshAt::default(),
            auto_per_strategy: DEFAULT_PER_STRATEGY,
            default_repeat: 1,
        }
    }
}

impl AppConfig {
    /// Charge `path` s'il est donné. Sinon `luckystat.json` s'il existe, sinon les valeurs par défaut.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Impossible de lire {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&json)
            .with_context(|| format!("JSON invalide dans {}", path.display()))?;
        config.validate()?;
        log::debug!("Configuration chargée depuis {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh.hour > 23 || self.refresh.minute > 59 {
            bail!(
                "Heure de renouvellement invalide : {:02}:{:02}",
                self.refresh.hour,
                self.refresh.minute
            );
        }
        if self.auto_per_strategy == 0 || self.auto_per_strategy > MAX_REPEAT {
            bail!("auto_per_strategy doit être entre 1 et {}", MAX_REPEAT);
        }
        if self.default_repeat == 0 || self.default_repeat > MAX_REPEAT {
            bail!("default_repeat doit être entre 1 et {}", MAX_REPEAT);
        }
        Ok(())
    }
}

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Tunables read from `<root>/settings.yaml`. Everything has a
/// default so a bare data directory still boots.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tick_rate: u32,
    pub registry_capacity: usize,
    pub save_interval_secs: u64,
    pub battle_seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_rate: 10,
            registry_capacity: 4096,
            save_interval_secs: 60,
            battle_seed: None,
        }
    }
}

#[derive(Debug)]
pub struct AppConfig {
    pub root: PathBuf,
    pub bind_addr: String,
    pub settings: Settings,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        if args.len() < 2 {
            return Err("usage: emberweald <data-root> [bind_addr]".to_string());
        }

        let root = Path::new(&args[1]).to_path_buf();
        let bind_addr = if args.len() > 2 {
            args[2].clone()
        } else {
            std::env::var("EMBERWEALD_BIND_ADDR")
                .ok()
                .and_then(|value| {
                    let trimmed = value.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(trimmed.to_string())
                    }
                })
                .unwrap_or_else(|| "0.0.0.0:9373".to_string())
        };

        let settings = Self::load_settings(&root)?;
        Ok(Self {
            root,
            bind_addr,
            settings,
        })
    }

    fn load_settings(root: &Path) -> Result<Settings, String> {
        let path = root.join("settings.yaml");
        if !path.exists() {
            return Ok(Settings::default());
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|err| format!("cannot read {}: {}", path.display(), err))?;
        serde_yaml::from_str(&text)
            .map_err(|err| format!("cannot parse {}: {}", path.display(), err))
    }
}

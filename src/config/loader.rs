use super::Config;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    /// Directory holding `config.toml` and the cache database (`~/.readbot`).
    pub fn default_dir() -> Result<PathBuf> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Ok(home.join(".readbot"))
    }

    /// Load `config.toml` from `dir`, writing the defaults first if missing.
    pub fn load_or_init_in(dir: &Path) -> Result<Self> {
        let config_path = dir.join("config.toml");

        if !dir.exists() {
            fs::create_dir_all(dir).context("Failed to create .readbot directory")?;
        }

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config = Self::from_toml(&contents)?;
            config.config_path.clone_from(&config_path);
            config.data_dir = dir.to_path_buf();
            Ok(config)
        } else {
            let config = Self {
                config_path,
                data_dir: dir.to_path_buf(),
                ..Self::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}

impl Config {
    /// Shallow-merge a JSON patch (as sent by the options UI) over this
    /// config. Top-level keys in the patch replace the stored ones; keys the
    /// patch omits keep their current values.
    pub fn merge_json(&self, patch: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(patch) = patch else {
            anyhow::bail!("config payload must be a JSON object");
        };

        let mut base = serde_json::to_value(self).context("Failed to serialize config")?;
        if let serde_json::Value::Object(base_map) = &mut base {
            for (key, value) in patch {
                base_map.insert(camel_case(&key), value);
            }
        }

        let mut merged: Self =
            serde_json::from_value(base).context("Failed to parse config payload")?;
        merged.config_path.clone_from(&self.config_path);
        merged.data_dir.clone_from(&self.data_dir);
        Ok(merged)
    }
}

/// `jina_api_key` -> `jinaApiKey`; camelCase keys pass through unchanged.
fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

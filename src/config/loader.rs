//! Configuration loader: merges defaults, files, then environment.

use super::{models::*, validation, ConfigError, Result, DEFAULT_CONFIG_FILES, ENV_PREFIX};
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use std::path::{Path, PathBuf};

/// Layers a default config, an optional file, and environment variables
/// through `figment`, then validates the merged result.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    figment: Figment,
}

impl ConfigLoader {
    pub fn new() -> Self {
        let figment = Figment::new().merge(Serialized::defaults(EngramConfig::default()));
        Self { figment }
    }

    /// Merge in a config file, dispatching on its extension.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileLoadError(format!("configuration file not found: {}", path.display())));
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => {
                self.figment = std::mem::take(&mut self.figment).merge(Toml::file(path));
            }
            Some("yaml") | Some("yml") => {
                self.figment = std::mem::take(&mut self.figment).merge(Yaml::file(path));
            }
            Some("json") => {
                self.figment = std::mem::take(&mut self.figment).merge(Json::file(path));
            }
            _ => {
                return Err(ConfigError::FileLoadError(format!("unsupported file format: {}", path.display())));
            }
        }

        Ok(self)
    }

    /// Try each of `DEFAULT_CONFIG_FILES` in the working directory, then the
    /// platform config directory, stopping at the first that loads.
    pub fn load_default_files(&mut self) -> &mut Self {
        for file in DEFAULT_CONFIG_FILES {
            let path = PathBuf::from(file);
            if path.exists() && self.load_file(&path).is_ok() {
                return self;
            }
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("dev", "engram", "engram") {
            let config_dir = proj_dirs.config_dir();
            for ext in &["toml", "yaml", "yml", "json"] {
                let path = config_dir.join(format!("config.{ext}"));
                if path.exists() && self.load_file(&path).is_ok() {
                    return self;
                }
            }
        }

        self
    }

    /// Merge in environment variables prefixed with [`ENV_PREFIX`].
    pub fn load_env(&mut self) -> &mut Self {
        self.figment = std::mem::take(&mut self.figment).merge(Env::prefixed(ENV_PREFIX).split("_").ignore(&["_"]));
        self
    }

    /// Merge in an arbitrary `figment` provider.
    pub fn merge<T: figment::Provider>(&mut self, provider: T) -> &mut Self {
        self.figment = std::mem::take(&mut self.figment).merge(provider);
        self
    }

    /// Extract and validate the merged configuration.
    pub fn extract(&self) -> Result<EngramConfig> {
        let config: EngramConfig = self.figment.extract().map_err(|e| ConfigError::ParseError(e.to_string()))?;
        validation::validate_config(&config)?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

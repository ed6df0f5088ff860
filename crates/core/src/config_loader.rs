use crate::config::EngineConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads engine configuration by merging defaults, TOML, and environment
    /// variables (`SENTINEL_` prefix).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<EngineConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Loads engine configuration from a specific TOML path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<EngineConfig> {
        let config: EngineConfig = Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SENTINEL_").split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ConfigLoader::load_from("config/does-not-exist.toml").unwrap();
        assert_eq!(config.ladder.strikes, 5);
        assert_eq!(config.ladder.expiries, 3);
        assert_eq!(config.monitor.tick_interval_ms, 1_000);
    }
}

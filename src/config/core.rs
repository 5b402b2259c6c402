use super::ParfoldConfig;
use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use std::path::PathBuf;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

pub(super) fn load(custom_config: Option<&str>) -> Result<ParfoldConfig> {
    let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

    // If custom config is specified, use only that + defaults + env vars
    if let Some(custom_path) = custom_config {
        figment = match extension(custom_path) {
            Some("json") => figment.merge(Json::file(custom_path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(custom_path)),
            _ => figment.merge(Toml::file(custom_path)),
        };
    } else {
        let user = user_config_path();
        figment = figment
            // User config
            .merge(Toml::file(user.join("config.toml")))
            .merge(Json::file(user.join("config.json")))
            .merge(Yaml::file(user.join("config.yaml")))
            // Project config
            .merge(Toml::file("parfold.toml"))
            .merge(Json::file("parfold.json"))
            .merge(Yaml::file("parfold.yaml"))
            .merge(Yaml::file("parfold.yml"));
    }

    // Environment variables always have highest priority
    figment = figment.merge(Env::prefixed("PARFOLD_").split("__"));

    figment
        .extract()
        .context("Failed to load parfold configuration")
}

fn extension(path: &str) -> Option<&str> {
    std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
}

fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("parfold")
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    // Jail runs each case in its own directory and restores the environment
    // afterwards, so the cases never see each other's variables or files.
    fn load_in_jail(custom_config: Option<&str>) -> figment::error::Result<ParfoldConfig> {
        load(custom_config).map_err(|err| format!("{err:#}").into())
    }

    #[test]
    fn test_config_loads_defaults() {
        Jail::expect_with(|_jail| {
            let config = load_in_jail(Some("non_existent.toml"))?;
            assert_eq!(config.parallel.thread_percentage, 75);
            assert_eq!(config.parallel.channel_buffer_multiplier, 2);
            assert_eq!(config.logging.level, "info");
            Ok(())
        });
    }

    #[test]
    fn test_custom_toml_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[parallel]\nworkers = 3\nprogress = false\n")?;

            let config = load_in_jail(Some("custom.toml"))?;
            assert_eq!(config.parallel.workers, 3);
            assert!(!config.parallel.progress);
            // Untouched keys keep their defaults
            assert_eq!(config.parallel.grace_period_ms, 2000);
            Ok(())
        });
    }

    #[test]
    fn test_custom_yaml_config() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yaml", "logging:\n  level: debug\n")?;

            let config = load_in_jail(Some("custom.yaml"))?;
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_project_file_is_merged() {
        Jail::expect_with(|jail| {
            jail.create_file("parfold.toml", "[parallel]\nworkers = 5\n")?;

            let config = load_in_jail(None)?;
            assert_eq!(config.parallel.workers, 5);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file("parfold.toml", "[parallel]\nmax_threads = 3\n")?;
            jail.set_env("PARFOLD_PARALLEL__MAX_THREADS", "7");

            let config = load_in_jail(None)?;
            assert_eq!(config.parallel.max_threads, 7);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("broken.toml", "[parallel]\nworkers = \"many\"\n")?;

            assert!(load(Some("broken.toml")).is_err());
            Ok(())
        });
    }
}

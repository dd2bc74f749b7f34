use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable consulted when no API key is configured.
pub(crate) const API_KEY_VAR: &str = "ROUTERCHAT_API_KEY";

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("failed to read config \"{}\": {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to reserialize config: {0}")]
    Reserialize(#[from] toml::ser::Error),
}

#[derive(Deserialize, Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Keybindings {
    #[default]
    Emacs,
    Vi,
}

#[derive(Deserialize, Serialize, Default, Debug, PartialEq)]
pub(crate) struct Router {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub default_model: Option<String>,
}

#[derive(Deserialize, Serialize, Default, Debug, PartialEq)]
pub(crate) struct Chat {
    #[serde(default)]
    pub keybindings: Keybindings,
}

#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub(crate) struct Catalog {
    #[serde(default = "default_families")]
    pub families: Vec<String>,
}

fn default_families() -> Vec<String> {
    vec!["gpt".to_string()]
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog {
            families: default_families(),
        }
    }
}

#[derive(Deserialize, Serialize, Default, Debug, PartialEq)]
pub(crate) struct Config {
    #[serde(default)]
    pub router: Router,
    #[serde(default)]
    pub chat: Chat,
    #[serde(default)]
    pub catalog: Catalog,
}

impl Config {
    /// The configured API key, falling back to the environment.
    pub(crate) fn api_key(&self) -> Option<String> {
        self.router
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_VAR).ok())
            .filter(|key| !key.is_empty())
    }
}

fn get_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME");

    if let Some(home) = home {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/routerchat/config.toml", ".routerchat.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/routerchat.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn extra_fields_helper<'a>(
    path: &mut Vec<&'a str>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
    extra: &mut Vec<String>,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        match (user_value, config.get(user_key)) {
            (toml::Value::Table(user_value), Some(toml::Value::Table(config_value))) => {
                extra_fields_helper(path, user_value, config_value, extra)
            }
            (_, Some(_)) => {}
            (_, None) => extra.push(path.join(".")),
        }

        path.pop();
    }
}

/// Lists the dotted paths of keys in `raw_config` which `config` does not
/// know about.
fn extra_fields(config: &Config, raw_config: &str) -> Result<Vec<String>, Error> {
    let user_config: toml::Table = toml::from_str(raw_config)?;
    let config: toml::Table = toml::from_str(&toml::to_string(config)?)?;

    let mut path = Vec::new();
    let mut extra = Vec::new();

    extra_fields_helper(&mut path, &user_config, &config, &mut extra);

    Ok(extra)
}

pub(crate) fn parse_config(raw_config: &str) -> Result<(Config, Vec<String>), Error> {
    let config: Config = toml::from_str(raw_config)?;

    let extra = extra_fields(&config, raw_config)?;

    Ok((config, extra))
}

fn read_config_file(path: &Path) -> Result<Config, Error> {
    let raw_config = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let (config, extra) = parse_config(&raw_config)?;

    for key in extra {
        crate::warn!("config contains extraneous key \"{}\", ignoring", key);
    }

    Ok(config)
}

/// Reads the config at `config`, or the first config found in the default
/// locations. No config at all yields the defaults.
pub(crate) fn read_config(config: Option<PathBuf>) -> Result<Config, Error> {
    match config.or_else(get_config_path) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "reading config");

            read_config_file(&path)
        }
        None => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let (config, extra) = parse_config("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.catalog.families, ["gpt"]);
        assert_eq!(config.chat.keybindings, Keybindings::Emacs);
        assert!(extra.is_empty());
    }

    #[test]
    fn test_full_config() {
        let raw = r#"
            [router]
            api_base = "https://router.example.com"
            api_key = "sk-test"
            default_model = "openai/gpt-4o"

            [chat]
            keybindings = "vi"

            [catalog]
            families = ["gpt", "claude"]
        "#;

        let (config, extra) = parse_config(raw).unwrap();

        assert_eq!(config.router.api_base.as_deref(), Some("https://router.example.com"));
        assert_eq!(config.api_key().as_deref(), Some("sk-test"));
        assert_eq!(config.router.default_model.as_deref(), Some("openai/gpt-4o"));
        assert_eq!(config.chat.keybindings, Keybindings::Vi);
        assert_eq!(config.catalog.families, ["gpt", "claude"]);
        assert!(extra.is_empty());
    }

    #[test]
    fn test_extra_fields() {
        let raw = r#"
            editor = "vim"

            [router]
            api_base = "http://localhost:8080"
            retries = 3

            [chat.colors]
            user = "blue"
        "#;

        let (_, mut extra) = parse_config(raw).unwrap();
        extra.sort();

        assert_eq!(extra, ["chat.colors", "editor", "router.retries"]);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            parse_config("[chat]\nkeybindings = \"nano\""),
            Err(Error::Parse(_))
        ));
        assert!(matches!(parse_config("[router"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = read_config(Some(PathBuf::from("/nonexistent/routerchat.toml")));

        assert!(matches!(result, Err(Error::Read { .. })));
    }
}

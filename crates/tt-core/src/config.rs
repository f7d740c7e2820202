use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{validate_user_name, Layout, MAIN_DIR};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// User identity record, stored either per repository or per machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtConfig {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Repo,
    /// Recorded for this user by `register`.
    User,
    Global,
    Env,
}

impl ConfigSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Repo => "repo",
            ConfigSource::User => "user",
            ConfigSource::Global => "global",
            ConfigSource::Env => "env",
        }
    }
}

/// The resolved current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub username: String,
    pub email: String,
    pub username_source: ConfigSource,
    pub email_source: ConfigSource,
}

pub fn repo_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(MAIN_DIR).join("config.toml")
}

/// Per-user record kept next to the user's private tasks.
pub fn user_config_path(repo_root: &Path, user: &str) -> PathBuf {
    Layout::new(repo_root).user_dir(user).join("config.toml")
}

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        let trimmed = profile.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    None
}

/// `$TT_CONFIG` when set, otherwise `~/.ttconfig`.
pub fn global_config_path() -> Option<PathBuf> {
    if let Ok(value) = std::env::var("TT_CONFIG") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    resolve_user_home_dir().map(|home| home.join(".ttconfig"))
}

pub fn default_username() -> String {
    for key in ["USER", "USERNAME"] {
        if let Ok(value) = std::env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    "any".to_string()
}

pub fn default_email() -> String {
    "none".to_string()
}

/// Missing file is `Ok(None)`; an unreadable or malformed file is an error.
pub fn load_config(path: &Path) -> Result<Option<TtConfig>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<TtConfig>(&text)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

pub fn write_config(path: &Path, config: &TtConfig) -> Result<PathBuf, ConfigError> {
    let io = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body).map_err(io)?;
    Ok(path.to_path_buf())
}

/// Merges the given fields into the config at `path`, keeping the others.
pub fn update_config(
    path: &Path,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<TtConfig, ConfigError> {
    let mut config = load_config(path)?.unwrap_or_default();
    if let Some(username) = username.map(str::trim).filter(|v| !v.is_empty()) {
        config.username = Some(username.to_string());
    }
    if let Some(email) = email.map(str::trim).filter(|v| !v.is_empty()) {
        config.email = Some(email.to_string());
    }
    write_config(path, &config)?;
    Ok(config)
}

/// Repository config first, then the global config, then the environment.
/// An email recorded at registration wins for that user.
pub fn resolve_profile(repo_root: Option<&Path>) -> Result<Profile, ConfigError> {
    let repo = match repo_root {
        Some(root) => load_config(&repo_config_path(root))?,
        None => None,
    };
    let global = match global_config_path() {
        Some(path) => load_config(&path)?,
        None => None,
    };

    let pick = |field: fn(&TtConfig) -> Option<&String>| -> Option<(String, ConfigSource)> {
        [(repo.as_ref(), ConfigSource::Repo), (global.as_ref(), ConfigSource::Global)]
            .into_iter()
            .find_map(|(config, source)| {
                config
                    .and_then(field)
                    .map(|value| value.trim())
                    .filter(|value| !value.is_empty())
                    .map(|value| (value.to_string(), source))
            })
    };

    let (username, username_source) = pick(|c| c.username.as_ref())
        .unwrap_or_else(|| (default_username(), ConfigSource::Env));
    let registered = match repo_root {
        Some(root) if validate_user_name(&username).is_ok() => {
            load_config(&user_config_path(root, &username))?
        }
        _ => None,
    };
    let (email, email_source) = registered
        .as_ref()
        .and_then(|config| config.email.as_deref())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| (value.to_string(), ConfigSource::User))
        .or_else(|| pick(|c| c.email.as_ref()))
        .unwrap_or_else(|| (default_email(), ConfigSource::Env));

    tracing::debug!(
        username = %username,
        source = username_source.as_str(),
        "resolved current user"
    );

    Ok(Profile {
        username,
        email,
        username_source,
        email_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::ffi::OsString;
    use tempfile::TempDir;

    struct EnvGuard {
        saved: Vec<(&'static str, Option<OsString>)>,
    }

    impl EnvGuard {
        fn capture() -> Self {
            Self {
                saved: ["TT_CONFIG", "USER", "USERNAME"]
                    .into_iter()
                    .map(|key| (key, std::env::var_os(key)))
                    .collect(),
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.saved {
                match value {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn write_and_read_config() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("nested").join("config.toml");
        let config = TtConfig {
            username: Some("alice".into()),
            email: Some("alice@example.com".into()),
        };
        write_config(&path, &config).expect("write config");
        assert_eq!(load_config(&path).expect("load"), Some(config));
    }

    #[test]
    fn load_config_reports_malformed_file() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "username = [").expect("write");
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn update_config_keeps_unspecified_fields() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("config.toml");
        update_config(&path, Some("alice"), Some("a@example.com")).expect("first");
        let updated = update_config(&path, None, Some("  new@example.com ")).expect("second");
        assert_eq!(updated.username.as_deref(), Some("alice"));
        assert_eq!(updated.email.as_deref(), Some("new@example.com"));
    }

    #[test]
    #[serial]
    fn resolve_profile_prefers_repo_over_global_then_env() {
        let _env = EnvGuard::capture();
        let repo = TempDir::new().expect("repo");
        let home = TempDir::new().expect("home");
        let global = home.path().join("ttconfig.toml");
        std::env::set_var("TT_CONFIG", &global);
        std::env::set_var("USER", "envuser");

        // Nothing configured -> environment defaults.
        let profile = resolve_profile(Some(repo.path())).expect("profile");
        assert_eq!(profile.username, "envuser");
        assert_eq!(profile.username_source, ConfigSource::Env);
        assert_eq!(profile.email, "none");

        // Global config applies when the repository has none.
        update_config(&global, Some("globaluser"), Some("g@example.com")).expect("global");
        let profile = resolve_profile(Some(repo.path())).expect("profile");
        assert_eq!(profile.username, "globaluser");
        assert_eq!(profile.username_source, ConfigSource::Global);

        // Repository config overrides per field.
        update_config(&repo_config_path(repo.path()), Some("repouser"), None).expect("repo");
        let profile = resolve_profile(Some(repo.path())).expect("profile");
        assert_eq!(profile.username, "repouser");
        assert_eq!(profile.username_source, ConfigSource::Repo);
        assert_eq!(profile.email, "g@example.com");
        assert_eq!(profile.email_source, ConfigSource::Global);
    }

    #[test]
    #[serial]
    fn registered_email_applies_to_that_user_only() {
        let _env = EnvGuard::capture();
        let repo = TempDir::new().expect("repo");
        let home = TempDir::new().expect("home");
        let global = home.path().join("ttconfig.toml");
        std::env::set_var("TT_CONFIG", &global);
        update_config(&global, None, Some("g@example.com")).expect("global");
        update_config(&user_config_path(repo.path(), "bob"), None, Some("bob@example.com"))
            .expect("bob");

        std::env::set_var("USER", "bob");
        let bob = resolve_profile(Some(repo.path())).expect("profile");
        assert_eq!(bob.email, "bob@example.com");
        assert_eq!(bob.email_source, ConfigSource::User);

        std::env::set_var("USER", "alice");
        let alice = resolve_profile(Some(repo.path())).expect("profile");
        assert_eq!(alice.email, "g@example.com");
        assert_eq!(alice.email_source, ConfigSource::Global);
    }

    #[test]
    #[serial]
    fn default_username_falls_back_to_any() {
        let _env = EnvGuard::capture();
        std::env::remove_var("USER");
        std::env::remove_var("USERNAME");
        assert_eq!(default_username(), "any");
    }
}

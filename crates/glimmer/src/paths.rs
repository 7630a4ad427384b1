use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "GLIMMER_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "GLIMMER_DATA_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Glimmer";
const APPLICATION: &str = "Glimmer";
const CONFIG_FILE: &str = "glimmer.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;

        let config_dir = dir_from_env(ENV_CONFIG_DIR, project_dirs.config_dir());
        let data_dir = dir_from_env(ENV_DATA_DIR, project_dirs.data_dir());

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Directories relative image paths are looked up in, in order.
    pub fn image_roots(&self) -> Vec<PathBuf> {
        vec![self.config_dir.join("images"), self.data_dir.join("images")]
    }
}

#[cfg(test)]
impl AppPaths {
    pub fn from_raw(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_dir,
            data_dir,
        }
    }
}

/// `name` from the environment when set and non-empty, else `default`.
fn dir_from_env(name: &str, default: &Path) -> PathBuf {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map_or_else(|| default.to_path_buf(), PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Runs `body` with the given variables set (or removed for `None`),
    /// restoring the previous values afterwards.
    fn with_env<T>(vars: &[(&str, Option<&Path>)], body: impl FnOnce() -> T) -> T {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let saved: Vec<_> = vars
            .iter()
            .map(|(name, value)| {
                let previous = env::var_os(name);
                match value {
                    Some(value) => env::set_var(name, value),
                    None => env::remove_var(name),
                }
                (name.to_string(), previous)
            })
            .collect();
        let result = body();
        for (name, previous) in saved {
            match previous {
                Some(value) => env::set_var(&name, value),
                None => env::remove_var(&name),
            }
        }
        result
    }

    #[test]
    fn env_overrides_take_precedence() {
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        let data_dir = root.path().join("data");

        let paths = with_env(
            &[
                (ENV_CONFIG_DIR, Some(config_dir.as_path())),
                (ENV_DATA_DIR, Some(data_dir.as_path())),
            ],
            AppPaths::discover,
        )
        .unwrap();

        assert_eq!(paths.config_dir(), config_dir.as_path());
        assert_eq!(paths.data_dir(), data_dir.as_path());
        assert_eq!(paths.config_file(), config_dir.join("glimmer.toml"));
    }

    #[test]
    fn empty_or_missing_override_uses_the_default() {
        let fallback = Path::new("/fallback");
        let resolved = with_env(&[(ENV_CONFIG_DIR, Some(Path::new("")))], || {
            dir_from_env(ENV_CONFIG_DIR, fallback)
        });
        assert_eq!(resolved, fallback);

        let resolved = with_env(&[(ENV_DATA_DIR, None)], || dir_from_env(ENV_DATA_DIR, fallback));
        assert_eq!(resolved, fallback);
    }

    #[test]
    fn image_roots_prefer_config_dir() {
        let paths = AppPaths::from_raw(PathBuf::from("/cfg"), PathBuf::from("/data"));
        assert_eq!(
            paths.image_roots(),
            vec![PathBuf::from("/cfg/images"), PathBuf::from("/data/images")]
        );
    }
}

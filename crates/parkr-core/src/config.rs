use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub state_path: PathBuf,
    pub archive_root: PathBuf,
    pub local_directories: Vec<PathBuf>,
}

impl AppConfig {
    /// Directory holding the state file; logs are written next to it.
    pub fn state_dir(&self) -> PathBuf {
        self.state_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Defaults, then an optional `Config.toml`, then `PARKR_*` environment
/// variables (`PARKR_LOCAL_DIRECTORIES` is comma separated).
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let home = home_dir();
    let default_local_directories: Vec<String> = ["code", "PycharmProjects", "RStudioProjects"]
        .iter()
        .map(|dir| home.join(dir).to_string_lossy().into_owned())
        .collect();

    let builder = Config::builder()
        .set_default(
            "state_path",
            home.join(".parkr").join("state.json").to_string_lossy().into_owned(),
        )?
        .set_default("archive_root", "/tmp/parkr-archive")?
        .set_default("local_directories", default_local_directories)?
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("PARKR")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("local_directories"),
        )
        .build()?;

    let mut config = builder.try_deserialize::<AppConfig>()?;
    config.local_directories = non_overlapping_directories(config.local_directories);
    Ok(config)
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        if result.iter().any(|kept| dir.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !kept.starts_with(&dir));
        result.push(dir);
    }

    result
}

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::db;
use crate::queue::QUEUE_DB_NAME;
use crate::worker::WorkerOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Base URL that relative manifest entries and requests resolve against
  pub origin: String,
  /// Cache namespace; bump it to ship a new version
  pub cache_namespace: String,
  /// Assets pre-fetched at install
  pub manifest: Vec<String>,
  /// Where the cache and queue databases live (defaults to the user data dir)
  pub data_dir: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    let options = WorkerOptions::default();
    Self {
      origin: options.origin.to_string(),
      cache_namespace: options.namespace,
      manifest: options.manifest,
      data_dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./movie-offline.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/movie-offline/config.yaml
  ///
  /// Without a file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("movie-offline.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("movie-offline").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.cache_namespace.trim().is_empty() {
      return Err(eyre!("cache_namespace must not be empty"));
    }
    Ok(config)
  }

  pub fn data_dir(&self) -> Result<PathBuf> {
    match &self.data_dir {
      Some(dir) => Ok(dir.clone()),
      None => Ok(db::default_data_dir()?),
    }
  }

  pub fn cache_db_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("cache.db"))
  }

  pub fn queue_db_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join(format!("{}.db", QUEUE_DB_NAME)))
  }

  pub fn worker_options(&self) -> Result<WorkerOptions> {
    let origin = Url::parse(&self.origin)
      .map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))?;

    Ok(WorkerOptions {
      namespace: self.cache_namespace.clone(),
      manifest: self.manifest.clone(),
      origin,
    })
  }
}

//! Manifest discovery and loading

use crate::config::schema::validate_manifest;
use crate::config::types::Manifest;
use crate::error::{ConfigError, ConfigResult, Result};
use directories::ProjectDirs;
use log::debug;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest file names, in lookup order
pub const MANIFEST_FILE_NAMES: &[&str] = &["clasp.yml", "clasp.yaml"];

/// Find a manifest from the current directory upward, then in the user's
/// configuration directory
pub fn find_manifest() -> ConfigResult<PathBuf> {
    let cwd = env::current_dir()
        .map_err(|e| ConfigError::Invalid(format!("Failed to get current directory: {}", e)))?;
    let user_dir = ProjectDirs::from("", "", "clasp").map(|dirs| dirs.config_dir().to_path_buf());
    find_manifest_in(cwd, user_dir.as_deref())
}

/// Walk from `start_dir` to the filesystem root looking for a manifest,
/// falling back to `user_dir`
pub fn find_manifest_in(start_dir: PathBuf, user_dir: Option<&Path>) -> ConfigResult<PathBuf> {
    let mut searched = Vec::new();
    let mut current = Some(start_dir.as_path());

    while let Some(dir) = current {
        if let Some(found) = manifest_in_dir(dir, &mut searched) {
            return Ok(found);
        }
        current = dir.parent();
    }

    if let Some(dir) = user_dir {
        if let Some(found) = manifest_in_dir(dir, &mut searched) {
            return Ok(found);
        }
    }

    Err(ConfigError::NotFound(searched.join(", ")))
}

fn manifest_in_dir(dir: &Path, searched: &mut Vec<String>) -> Option<PathBuf> {
    for file_name in MANIFEST_FILE_NAMES {
        let path = dir.join(file_name);
        searched.push(path.display().to_string());
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

/// Parse and validate manifest text
pub fn parse_manifest(yaml: &str) -> Result<Manifest> {
    let manifest: Manifest = serde_yaml::from_str(yaml)?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

/// Read, parse and validate a manifest file
pub fn parse_manifest_file(path: &Path) -> Result<Manifest> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    debug!("loaded manifest {}", path.display());
    parse_manifest(&contents)
}

/// Load the `.env` file beside the manifest into the process environment.
/// Variables already set win; a missing file is not an error.
pub fn load_dotenv(manifest_path: &Path) -> ConfigResult<Option<PathBuf>> {
    let dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let env_path = dir.join(".env");
    if !env_path.is_file() {
        return Ok(None);
    }
    dotenvy::from_path(&env_path).map_err(|e| ConfigError::ReadFile {
        path: env_path.clone(),
        error: e.to_string(),
    })?;
    debug!("loaded environment from {}", env_path.display());
    Ok(Some(env_path))
}

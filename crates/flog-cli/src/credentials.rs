//! Locate and load `credentials.yaml` by walking up the directory tree.

use std::fs;
use std::path::{Component, Path, PathBuf};

use flog_api_types::AuthRequest;
use serde::Deserialize;
use tracing::debug;

use crate::client::CliError;

pub const CREDENTIALS_FILE: &str = "credentials.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub local_domain: String,
    pub remote_domain: String,
}

impl Credentials {
    pub fn domain(&self, remote: bool) -> &str {
        if remote {
            &self.remote_domain
        } else {
            &self.local_domain
        }
    }

    pub fn auth_request(&self) -> AuthRequest {
        AuthRequest {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Directories from `start` up to the filesystem root.
///
/// A relative start is anchored at the working directory first, so `../site`
/// still reaches the root. The root is yielded exactly once and ends the walk.
pub fn walkback(start: &Path) -> Walkback {
    let anchored = std::path::absolute(start).unwrap_or_else(|_| start.to_path_buf());
    let normalized = normalize(&anchored);
    let first = if normalized.is_file() {
        normalized
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    } else {
        normalized
    };
    Walkback { next: Some(first) }
}

#[derive(Debug)]
pub struct Walkback {
    next: Option<PathBuf>,
}

impl Iterator for Walkback {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        let current = self.next.take()?;
        self.next = current.parent().map(Path::to_path_buf);
        Some(current)
    }
}

/// Lexically collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn find_credentials(start: &Path) -> Option<PathBuf> {
    walkback(start)
        .map(|dir| dir.join(CREDENTIALS_FILE))
        .find(|candidate| candidate.is_file())
}

/// Load the nearest credentials file. Nothing touches the network before this succeeds.
pub fn load_credentials(start: &Path) -> Result<(PathBuf, Credentials), CliError> {
    let path = find_credentials(start).ok_or_else(|| CliError::ConfigurationNotFound {
        start: start.to_path_buf(),
    })?;
    debug!(target = "flog_cli::credentials", path = %path.display(), "using credentials");

    let raw = fs::read_to_string(&path).map_err(|err| CliError::Credentials {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    let credentials =
        serde_yaml_ng::from_str::<Credentials>(&raw).map_err(|err| CliError::Credentials {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
    Ok((path, credentials))
}

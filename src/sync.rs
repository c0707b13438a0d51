//! Refresh a working copy of a store that is committed to git.

use anyhow::Result;
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

use crate::config::SyncPolicy;
use crate::error::FuturesError;

/// Run `git pull` inside `repo`, returning git's stdout
pub fn git_pull(repo: &Path) -> Result<String> {
    info!("Pulling latest data in {:?}", repo);

    let output = Command::new("git")
        .arg("pull")
        .current_dir(repo)
        .output()
        .map_err(|e| FuturesError::Sync(format!("could not run git in {:?}: {}", repo, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FuturesError::Sync(format!(
            "git pull in {:?} exited with {}: {}",
            repo,
            output.status,
            stderr.trim()
        ))
        .into());
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    info!("git pull: {}", stdout);
    Ok(stdout)
}

/// Pull `repo` and apply the failure policy
pub fn sync_working_copy(repo: &Path, policy: SyncPolicy) -> Result<()> {
    match git_pull(repo) {
        Ok(_) => Ok(()),
        Err(e) => match policy {
            SyncPolicy::Warn => {
                warn!("Continuing with local data: {:#}", e);
                Ok(())
            }
            SyncPolicy::Fail => Err(e),
        },
    }
}

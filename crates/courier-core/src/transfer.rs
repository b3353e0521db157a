//! Transfer orchestrator: fetches every remote archive missing locally.

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::inventory::{files_to_download, list_names};
use crate::paths::Layout;
use crate::relocate::{persist_staged, staging_file};
use crate::report::TransferOutcome;
use crate::transport::{remote_path, RemoteSession};

const MB: f64 = 1_000_000.0;

/// Logs transfer progress at most once per whole percent.
pub struct ProgressLog<'a> {
    file: &'a str,
    last_percent: Option<u64>,
}

impl<'a> ProgressLog<'a> {
    pub fn new(file: &'a str) -> Self {
        Self {
            file,
            last_percent: None,
        }
    }

    /// Returns the percentage when a line was emitted.
    pub fn observe(&mut self, done: u64, total: u64) -> Option<u64> {
        let percent = if total == 0 { 100 } else { done.saturating_mul(100) / total };
        if self.last_percent == Some(percent) {
            return None;
        }
        self.last_percent = Some(percent);
        info!(
            file = self.file,
            percent,
            "transferred {:.1} MB of {:.1} MB",
            done as f64 / MB,
            total as f64 / MB
        );
        Some(percent)
    }
}

pub struct TransferOrchestrator<'a> {
    layout: &'a Layout,
}

impl<'a> TransferOrchestrator<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// A listing failure aborts the run; a single failed fetch does not.
    pub fn run(&self, session: &mut dyn RemoteSession) -> Result<Vec<TransferOutcome>> {
        let remote_dir = self.layout.remote_dir();
        let remote = session.list(remote_dir)?;
        let local = list_names(&self.layout.encrypted)?;
        let missing = files_to_download(&remote, &local);
        info!(count = missing.len(), "downloading files");

        let mut outcomes = Vec::with_capacity(missing.len());
        for file in missing {
            info!(file = %file, "downloading");
            match self.fetch_one(session, remote_dir, &file) {
                Ok(bytes) => outcomes.push(TransferOutcome::Downloaded { file, bytes }),
                Err(err) => {
                    error!(file = %file, error = %format!("{err:#}"), "download failed");
                    outcomes.push(TransferOutcome::Failed {
                        file,
                        error: format!("{err:#}"),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    fn fetch_one(&self, session: &mut dyn RemoteSession, remote_dir: &str, file: &str) -> Result<u64> {
        let staged = staging_file(&self.layout.staging)?;
        let mut progress = ProgressLog::new(file);
        let bytes = session.fetch(
            &remote_path(remote_dir, file),
            staged.path(),
            &mut |done, total| {
                progress.observe(done, total);
            },
        )?;
        persist_staged(staged, &self.layout.encrypted_path(file))
            .with_context(|| format!("store {file}"))?;
        Ok(bytes)
    }
}

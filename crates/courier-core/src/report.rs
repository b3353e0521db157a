use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::naming::NamingError;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    Downloaded { file: String, bytes: u64 },
    Failed { file: String, error: String },
}

/// Why an archive was left for a later cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("{name}")]
    UnresolvableName { name: NamingError },
    #[error("no password found for identifier {id}")]
    MissingCredential { id: String },
    #[error("wrong password")]
    WrongPassword,
    #[error("corrupt archive: {detail}")]
    Corrupt { detail: String },
    #[error("archive has no members")]
    EmptyArchive,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecryptOutcome {
    Decrypted {
        archive: String,
        output: String,
        bytes: u64,
    },
    Skipped {
        archive: String,
        reason: SkipReason,
    },
    Failed {
        archive: String,
        error: String,
    },
}

impl From<NamingError> for SkipReason {
    fn from(name: NamingError) -> Self {
        Self::UnresolvableName { name }
    }
}

impl DecryptOutcome {
    pub fn archive(&self) -> &str {
        match self {
            Self::Decrypted { archive, .. }
            | Self::Skipped { archive, .. }
            | Self::Failed { archive, .. } => archive,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub transfers: Vec<TransferOutcome>,
    pub decrypts: Vec<DecryptOutcome>,
    pub credentials_loaded: usize,
    pub credential_skips: Vec<String>,
    /// Set when the cycle was abandoned before decryption.
    pub aborted: Option<String>,
    pub decrypt_error: Option<String>,
}

impl CycleReport {
    pub fn begin() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            transfers: Vec::new(),
            decrypts: Vec::new(),
            credentials_loaded: 0,
            credential_skips: Vec::new(),
            aborted: None,
            decrypt_error: None,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn downloaded(&self) -> usize {
        self.transfers
            .iter()
            .filter(|t| matches!(t, TransferOutcome::Downloaded { .. }))
            .count()
    }

    pub fn decrypted(&self) -> usize {
        self.decrypts
            .iter()
            .filter(|d| matches!(d, DecryptOutcome::Decrypted { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.decrypts
            .iter()
            .filter(|d| matches!(d, DecryptOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        let transfers = self
            .transfers
            .iter()
            .filter(|t| matches!(t, TransferOutcome::Failed { .. }))
            .count();
        let decrypts = self
            .decrypts
            .iter()
            .filter(|d| matches!(d, DecryptOutcome::Failed { .. }))
            .count();
        transfers + decrypts
    }

    pub fn log_summary(&self) {
        if let Some(reason) = &self.aborted {
            warn!(reason = %reason, "cycle aborted");
            return;
        }
        let elapsed_ms = self
            .finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or_default();
        info!(
            downloaded = self.downloaded(),
            decrypted = self.decrypted(),
            skipped = self.skipped(),
            failed = self.failed(),
            elapsed_ms,
            "cycle complete"
        );
    }
}

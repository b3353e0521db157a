use anyhow::Context;
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Drop location, relative to the remote session root.
pub const REMOTE_DROP_DIR: &str = "pub/US";

const DROP_SEGMENTS: [&str; 2] = ["pub", "US"];

/// Local storage layout. Every directory hangs off a single root so the whole
/// agent state can be relocated by pointing `--root` elsewhere.
#[derive(Debug, Clone)]
pub struct Layout {
    pub root: PathBuf,
    pub encrypted: PathBuf,
    pub decrypted: PathBuf,
    pub passwords: PathBuf,
    pub staging: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStatus {
    CleanRun,
    Existing,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let data = root.join("data");
        let under = |kind: &str| {
            let mut p = data.join(kind);
            for seg in DROP_SEGMENTS {
                p.push(seg);
            }
            p
        };
        Self {
            encrypted: under("encrypted"),
            decrypted: under("decrypted"),
            passwords: under("passwords"),
            staging: under("staging"),
            root,
        }
    }

    pub fn remote_dir(&self) -> &'static str {
        REMOTE_DROP_DIR
    }

    /// Builds the directory tree when local encrypted storage is missing.
    /// The staging directory is always ensured since older trees predate it.
    pub fn bootstrap(&self) -> anyhow::Result<BootstrapStatus> {
        let status = if self.encrypted.exists() {
            BootstrapStatus::Existing
        } else {
            info!("clean run detected, creating data directories");
            for dir in [&self.encrypted, &self.decrypted, &self.passwords] {
                fs::create_dir_all(dir)
                    .with_context(|| format!("create {}", dir.display()))?;
            }
            info!(
                passwords = %self.passwords.display(),
                "add password files to the credential directory"
            );
            BootstrapStatus::CleanRun
        };
        fs::create_dir_all(&self.staging)
            .with_context(|| format!("create {}", self.staging.display()))?;
        Ok(status)
    }

    pub fn decrypted_path(&self, name: &str) -> PathBuf {
        self.decrypted.join(name)
    }

    pub fn encrypted_path(&self, name: &str) -> PathBuf {
        self.encrypted.join(name)
    }
}

pub fn default_known_hosts() -> PathBuf {
    UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".ssh").join("known_hosts"))
        .unwrap_or_else(|| Path::new(".ssh").join("known_hosts"))
}

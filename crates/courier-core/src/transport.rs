//! Remote file-transfer seam. The service crate provides the SFTP session;
//! tests substitute an in-memory one.

use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect to {target}: {reason}")]
    Connect { target: String, reason: String },
    #[error("host key rejected for {host}: {reason}")]
    HostKey { host: String, reason: String },
    #[error("authentication failed for {user}: {reason}")]
    Auth { user: String, reason: String },
    #[error("list {path}: {reason}")]
    List { path: String, reason: String },
    #[error("fetch {path}: {reason}")]
    Fetch { path: String, reason: String },
}

pub trait RemoteSession {
    /// Names of the regular files in `dir`.
    fn list(&mut self, dir: &str) -> Result<BTreeSet<String>, TransportError>;

    /// Copies `remote` into `local`, calling `progress(done, total)` as bytes
    /// arrive, and stamps `local` with the remote modification time.
    fn fetch(
        &mut self,
        remote: &str,
        local: &Path,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<u64, TransportError>;
}

pub trait Transport: Send + Sync {
    fn connect(&self) -> Result<Box<dyn RemoteSession>, TransportError>;
}

pub fn remote_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

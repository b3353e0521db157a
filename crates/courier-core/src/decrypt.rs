//! Decryption orchestrator.
//!
//! For every archive the differ reports as not yet decrypted:
//!
//! 1. Derive the password identifier from the file name
//! 2. Resolve it in this cycle's credential snapshot
//! 3. Open the archive and take its first member
//! 4. Extract into a staging file with the password
//! 5. Move the staging file to `<stem>.txt` in decrypted storage
//!
//! A missing credential, wrong password or corrupt archive is a skip: the
//! archive stays pending and is retried next cycle. Any other failure is
//! recorded for that archive only. Nothing here stops the batch.

use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{error, info, warn};

use crate::archive::{EncryptedArchive, ExtractError, Extractor};
use crate::credentials::CredentialStore;
use crate::inventory::{files_to_decrypt, list_names};
use crate::naming::ArchiveName;
use crate::paths::Layout;
use crate::relocate::{persist_staged, staging_file};
use crate::report::{DecryptOutcome, SkipReason};

enum AttemptError {
    Skip(SkipReason),
    Fail(anyhow::Error),
}

// Bad password and bad archive cannot be told apart reliably, and both may
// clear up once a new credential or a fresh download shows up.
impl From<ExtractError> for AttemptError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::WrongPassword => Self::Skip(SkipReason::WrongPassword),
            ExtractError::Corrupt(detail) => Self::Skip(SkipReason::Corrupt { detail }),
            ExtractError::Io(e) => Self::Fail(e.into()),
        }
    }
}

fn fail(err: impl Into<anyhow::Error>) -> AttemptError {
    AttemptError::Fail(err.into())
}

pub struct DecryptOrchestrator<'a, X: Extractor> {
    layout: &'a Layout,
    extractor: &'a X,
}

impl<'a, X: Extractor> DecryptOrchestrator<'a, X> {
    pub fn new(layout: &'a Layout, extractor: &'a X) -> Self {
        Self { layout, extractor }
    }

    /// Archives in encrypted storage without a decrypted counterpart.
    pub fn pending(&self) -> Result<BTreeSet<String>> {
        let encrypted = list_names(&self.layout.encrypted)?;
        let decrypted = list_names(&self.layout.decrypted)?;
        Ok(files_to_decrypt(&encrypted, &decrypted))
    }

    /// Errors only when storage cannot be listed.
    pub fn run(&self, credentials: &CredentialStore) -> Result<Vec<DecryptOutcome>> {
        let pending = self.pending()?;
        info!(count = pending.len(), "going to try expanding archives");
        Ok(pending
            .iter()
            .map(|name| self.decrypt_one(name, credentials))
            .collect())
    }

    pub fn decrypt_one(&self, file_name: &str, credentials: &CredentialStore) -> DecryptOutcome {
        let archive = file_name.to_string();
        let name = match ArchiveName::parse(file_name) {
            Ok(name) => name,
            Err(e) => {
                warn!(archive = %archive, reason = %e, "cannot resolve a password for archive");
                return DecryptOutcome::Skipped {
                    archive,
                    reason: e.into(),
                };
            }
        };
        let Some(password) = credentials.get(name.password_id()) else {
            info!(archive = %archive, id = name.password_id(), "no password found to expand archive");
            return DecryptOutcome::Skipped {
                archive,
                reason: SkipReason::MissingCredential {
                    id: name.password_id().to_string(),
                },
            };
        };

        match self.extract_to_storage(&name, password) {
            Ok((output, bytes)) => {
                info!(archive = %archive, output = %output, bytes, "archive expanded");
                DecryptOutcome::Decrypted {
                    archive,
                    output,
                    bytes,
                }
            }
            Err(AttemptError::Skip(reason)) => {
                warn!(archive = %archive, reason = %reason, "can't inflate archive, will retry next cycle");
                DecryptOutcome::Skipped { archive, reason }
            }
            Err(AttemptError::Fail(err)) => {
                error!(archive = %archive, error = %format!("{err:#}"), "archive expansion failed");
                DecryptOutcome::Failed {
                    archive,
                    error: format!("{err:#}"),
                }
            }
        }
    }

    fn extract_to_storage(
        &self,
        name: &ArchiveName,
        password: &str,
    ) -> Result<(String, u64), AttemptError> {
        let source = self.layout.encrypted_path(name.file_name());
        let mut archive = self.extractor.open(&source)?;

        let members = archive.members();
        let member = members
            .first()
            .ok_or(AttemptError::Skip(SkipReason::EmptyArchive))?;
        if members.len() > 1 {
            warn!(
                archive = name.file_name(),
                ignored = members.len() - 1,
                "archive holds several members, only the first is extracted"
            );
        }

        let mut staged = staging_file(&self.layout.staging).map_err(AttemptError::Fail)?;
        let bytes = archive.extract(member, password.as_bytes(), &mut staged)?;
        staged.as_file().sync_all().map_err(fail)?;

        let output = name.decrypted_name();
        persist_staged(staged, &self.layout.decrypted_path(&output)).map_err(AttemptError::Fail)?;
        Ok((output, bytes))
    }
}

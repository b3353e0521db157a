//! Filename convention shared by the differ and the decryptor.
//!
//! Archives arrive as `<stem>_<passwordId>.zip`; their payload is stored as
//! `<stem>_<passwordId>.txt`. The derived name is the only link between an
//! archive and its payload.

use serde::Serialize;

pub const ENCRYPTED_EXT: &str = ".zip";
pub const DECRYPTED_EXT: &str = ".txt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum NamingError {
    #[error("{0} does not end in .zip")]
    NotAnArchive(String),
    #[error("{0} has no underscore-separated password identifier")]
    NoIdentifier(String),
    #[error("{0} has an empty password identifier")]
    EmptyIdentifier(String),
}

/// An encrypted archive name that satisfies the convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    file_name: String,
    password_id: String,
}

impl ArchiveName {
    pub fn parse(file_name: &str) -> Result<Self, NamingError> {
        let stem = file_name
            .strip_suffix(ENCRYPTED_EXT)
            .ok_or_else(|| NamingError::NotAnArchive(file_name.to_string()))?;
        let (_, id) = stem
            .rsplit_once('_')
            .ok_or_else(|| NamingError::NoIdentifier(file_name.to_string()))?;
        if id.is_empty() {
            return Err(NamingError::EmptyIdentifier(file_name.to_string()));
        }
        Ok(Self {
            file_name: file_name.to_string(),
            password_id: id.to_string(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn password_id(&self) -> &str {
        &self.password_id
    }

    pub fn decrypted_name(&self) -> String {
        decrypted_name_for(&self.file_name)
    }
}

/// `.zip` → `.txt`. Names without the encrypted extension are returned as-is.
pub fn decrypted_name_for(encrypted: &str) -> String {
    match encrypted.strip_suffix(ENCRYPTED_EXT) {
        Some(stem) => format!("{stem}{DECRYPTED_EXT}"),
        None => encrypted.to_string(),
    }
}

/// `.txt` → `.zip`. Names without the decrypted extension are returned as-is,
/// so they never suppress an archive.
pub fn encrypted_name_for(decrypted: &str) -> String {
    match decrypted.strip_suffix(DECRYPTED_EXT) {
        Some(stem) => format!("{stem}{ENCRYPTED_EXT}"),
        None => decrypted.to_string(),
    }
}

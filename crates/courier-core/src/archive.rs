//! Password-protected archive extraction.
//!
//! The decryptor only needs to list members and pull one member out with a
//! password, so that is all the `Extractor` seam exposes. `ZipExtractor` is
//! the production implementation (ZipCrypto and AES entries).

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("wrong password")]
    WrongPassword,
    #[error("corrupt archive: {0}")]
    Corrupt(String),
    #[error("archive i/o: {0}")]
    Io(#[from] io::Error),
}

impl ExtractError {
    fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::InvalidData {
            Self::Corrupt(err.to_string())
        } else {
            Self::Io(err)
        }
    }
}

impl From<ZipError> for ExtractError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::InvalidPassword => Self::WrongPassword,
            ZipError::Io(e) => Self::from_read(e),
            other => Self::Corrupt(other.to_string()),
        }
    }
}

pub trait EncryptedArchive {
    /// Member names in archive order.
    fn members(&self) -> Vec<String>;

    /// Decrypts `member` into `out`, returning the number of bytes written.
    fn extract(
        &mut self,
        member: &str,
        password: &[u8],
        out: &mut dyn Write,
    ) -> Result<u64, ExtractError>;
}

pub trait Extractor: Send + Sync {
    type Archive: EncryptedArchive;

    fn open(&self, path: &Path) -> Result<Self::Archive, ExtractError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

pub struct ZipEncrypted {
    inner: ZipArchive<BufReader<File>>,
}

impl Extractor for ZipExtractor {
    type Archive = ZipEncrypted;

    fn open(&self, path: &Path) -> Result<ZipEncrypted, ExtractError> {
        let file = File::open(path)?;
        let inner = ZipArchive::new(BufReader::new(file))?;
        Ok(ZipEncrypted { inner })
    }
}

impl EncryptedArchive for ZipEncrypted {
    fn members(&self) -> Vec<String> {
        self.inner.file_names().map(str::to_owned).collect()
    }

    fn extract(
        &mut self,
        member: &str,
        password: &[u8],
        out: &mut dyn Write,
    ) -> Result<u64, ExtractError> {
        let mut entry = self.inner.by_name_decrypt(member, password)?;
        io::copy(&mut entry, out).map_err(ExtractError::from_read)
    }
}

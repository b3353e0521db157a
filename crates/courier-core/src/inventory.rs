//! Directory listings and the two work-set differs.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

use crate::naming::encrypted_name_for;

/// Names of the regular files directly inside `dir`.
pub fn list_names(dir: &Path) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) => {
                names.insert(name.to_string());
            }
            None => warn!(path = %entry.path().display(), "skipping non-UTF-8 file name"),
        }
    }
    Ok(names)
}

/// Remote files not yet present locally. Names are compared verbatim.
pub fn files_to_download(remote: &BTreeSet<String>, local: &BTreeSet<String>) -> BTreeSet<String> {
    remote.difference(local).cloned().collect()
}

/// Local archives whose derived payload name is not yet in decrypted storage.
pub fn files_to_decrypt(
    encrypted: &BTreeSet<String>,
    decrypted: &BTreeSet<String>,
) -> BTreeSet<String> {
    let done: BTreeSet<String> = decrypted.iter().map(|n| encrypted_name_for(n)).collect();
    encrypted.difference(&done).cloned().collect()
}

//! Integration tests for the decryption orchestrator.
//!
//! Tests cover:
//!  1. Missing credential → skipped, storage untouched
//!  2. Correct password → payload stored under derived name
//!  3. Re-run after success → no further attempt
//!  4. Wrong password → skipped, storage untouched
//!  5. Name without identifier → skipped
//!  6. One failing archive does not stop the batch
//!  7. Multi-member archive → first member only
//!  8. Crash between extract and move → retried cleanly
//!  9. Traditional ZipCrypto archives → inflated, wrong password skipped

use courier_core::archive::{EncryptedArchive, ExtractError, Extractor, ZipExtractor};
use courier_core::credentials::{load_credentials, parse_record, CredentialStore};
use courier_core::decrypt::DecryptOrchestrator;
use courier_core::naming::NamingError;
use courier_core::paths::Layout;
use courier_core::relocate::{cleanup_orphans, staging_file};
use courier_core::report::{DecryptOutcome, SkipReason};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tempfile::{tempdir, TempDir};
use zip::unstable::write::FileOptionsExt;
use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod};

const ARCHIVE: &str = "data_20240101_X.zip";
const PAYLOAD: &str = "data_20240101_X.txt";

fn setup() -> (TempDir, Layout) {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    layout.bootstrap().unwrap();
    (dir, layout)
}

fn write_encrypted_zip(path: &Path, members: &[(&str, &[u8])], password: &str) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, body) in members {
        let opts = SimpleFileOptions::default().with_aes_encryption(AesMode::Aes256, password);
        writer.start_file(*name, opts).unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap();
}

fn write_zipcrypto_zip(path: &Path, member: &str, body: &[u8], password: &str) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    let opts = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .with_deprecated_encryption(password.as_bytes());
    writer.start_file(member, opts).unwrap();
    writer.write_all(body).unwrap();
    writer.finish().unwrap();
}

fn store(records: &[&str]) -> CredentialStore {
    records.iter().map(|r| parse_record(r).unwrap()).collect()
}

fn names(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect()
}

// ─── Test 1: missing credential ─────────────────────────────────────────────

#[test]
fn test_missing_password_skips_without_changes() {
    let (_dir, layout) = setup();
    write_encrypted_zip(
        &layout.encrypted_path(ARCHIVE),
        &[("inner.dat", b"contents")],
        "secret",
    );

    let extractor = ZipExtractor;
    let outcomes = DecryptOrchestrator::new(&layout, &extractor)
        .run(&store(&["OTHER pw"]))
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(
        &outcomes[0],
        DecryptOutcome::Skipped { reason: SkipReason::MissingCredential { id }, .. } if id == "X"
    ));
    assert!(names(&layout.decrypted).is_empty());
    assert!(names(&layout.staging).is_empty());
}

// ─── Test 2: success path ───────────────────────────────────────────────────

#[test]
fn test_correct_password_stores_payload() {
    let (_dir, layout) = setup();
    write_encrypted_zip(
        &layout.encrypted_path(ARCHIVE),
        &[("inner.dat", b"the decrypted contents")],
        "secret",
    );

    let extractor = ZipExtractor;
    let outcomes = DecryptOrchestrator::new(&layout, &extractor)
        .run(&store(&["X secret"]))
        .unwrap();

    assert!(matches!(
        &outcomes[..],
        [DecryptOutcome::Decrypted { output, bytes: 22, .. }] if output == PAYLOAD
    ));
    assert_eq!(names(&layout.decrypted), BTreeSet::from([PAYLOAD.to_string()]));
    assert_eq!(
        fs::read(layout.decrypted_path(PAYLOAD)).unwrap(),
        b"the decrypted contents"
    );
    // Archive stays, nothing else appears.
    assert_eq!(names(&layout.encrypted), BTreeSet::from([ARCHIVE.to_string()]));
    assert!(names(&layout.staging).is_empty());
    assert!(!layout.root.join("inner.dat").exists());
}

// ─── Test 3: idempotent re-run ──────────────────────────────────────────────

#[test]
fn test_rerun_makes_no_second_attempt() {
    let (_dir, layout) = setup();
    write_encrypted_zip(
        &layout.encrypted_path(ARCHIVE),
        &[("inner.dat", b"payload")],
        "secret",
    );
    let creds = store(&["X secret"]);

    let counting = CountingExtractor::default();
    let orchestrator = DecryptOrchestrator::new(&layout, &counting);
    assert_eq!(orchestrator.run(&creds).unwrap().len(), 1);
    assert_eq!(counting.opened(), 1);

    assert!(orchestrator.pending().unwrap().is_empty());
    assert!(orchestrator.run(&creds).unwrap().is_empty());
    assert_eq!(counting.opened(), 1);
}

// ─── Test 4: wrong password ─────────────────────────────────────────────────

#[test]
fn test_wrong_password_skips_without_changes() {
    let (_dir, layout) = setup();
    write_encrypted_zip(
        &layout.encrypted_path(ARCHIVE),
        &[("inner.dat", b"payload")],
        "secret",
    );

    let extractor = ZipExtractor;
    let outcomes = DecryptOrchestrator::new(&layout, &extractor)
        .run(&store(&["X wrong"]))
        .unwrap();

    assert!(matches!(
        &outcomes[..],
        [DecryptOutcome::Skipped {
            reason: SkipReason::WrongPassword,
            ..
        }]
    ));
    assert!(names(&layout.decrypted).is_empty());
    assert!(names(&layout.staging).is_empty());
}

// ─── Test 9: ZipCrypto archives ─────────────────────────────────────────────

#[test]
fn test_zipcrypto_archive_is_inflated() {
    let (_dir, layout) = setup();
    let body: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    write_zipcrypto_zip(&layout.encrypted_path(ARCHIVE), "inner.dat", &body, "secret");

    let extractor = ZipExtractor;
    let outcomes = DecryptOrchestrator::new(&layout, &extractor)
        .run(&store(&["X secret"]))
        .unwrap();

    assert!(matches!(
        &outcomes[..],
        [DecryptOutcome::Decrypted { bytes: 20_000, .. }]
    ));
    assert_eq!(fs::read(layout.decrypted_path(PAYLOAD)).unwrap(), body);
    assert!(names(&layout.staging).is_empty());
}

#[test]
fn test_zipcrypto_wrong_password_skips_without_changes() {
    let (_dir, layout) = setup();
    write_zipcrypto_zip(
        &layout.encrypted_path(ARCHIVE),
        "inner.dat",
        b"payload payload payload",
        "secret",
    );

    let extractor = ZipExtractor;
    let outcomes = DecryptOrchestrator::new(&layout, &extractor)
        .run(&store(&["X wrong"]))
        .unwrap();

    // ZipCrypto verifies a single header byte; a wrong password that slips
    // past it fails the CRC check instead.
    assert!(matches!(
        &outcomes[..],
        [DecryptOutcome::Skipped {
            reason: SkipReason::WrongPassword | SkipReason::Corrupt { .. },
            ..
        }]
    ));
    assert!(names(&layout.decrypted).is_empty());
    assert!(names(&layout.staging).is_empty());
}

// ─── Test 5: unresolvable name ──────────────────────────────────────────────

#[test]
fn test_name_without_identifier_is_skipped() {
    let (_dir, layout) = setup();
    write_encrypted_zip(
        &layout.encrypted_path("plain.zip"),
        &[("inner.dat", b"payload")],
        "secret",
    );

    let extractor = ZipExtractor;
    let outcomes = DecryptOrchestrator::new(&layout, &extractor)
        .run(&store(&["plain secret"]))
        .unwrap();

    assert!(matches!(
        &outcomes[..],
        [DecryptOutcome::Skipped {
            reason: SkipReason::UnresolvableName {
                name: NamingError::NoIdentifier(_)
            },
            ..
        }]
    ));
}

// ─── Test 6: partial failure tolerance ──────────────────────────────────────

#[test]
fn test_failing_archive_does_not_stop_batch() {
    let (_dir, layout) = setup();
    for name in ["a_X.zip", "b_X.zip", "c_X.zip"] {
        fs::write(layout.encrypted_path(name), b"stand-in").unwrap();
    }

    let extractor = ScriptedExtractor {
        failing: "b_X.zip".into(),
    };
    let outcomes = DecryptOrchestrator::new(&layout, &extractor)
        .run(&store(&["X secret"]))
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| matches!(o, DecryptOutcome::Failed { .. }))
        .map(|o| o.archive())
        .collect();
    assert_eq!(failed, vec!["b_X.zip"]);
    assert_eq!(
        names(&layout.decrypted),
        BTreeSet::from(["a_X.txt".to_string(), "c_X.txt".to_string()])
    );
}

// ─── Test 7: multi-member archive ───────────────────────────────────────────

#[test]
fn test_only_first_member_is_extracted() {
    let (_dir, layout) = setup();
    write_encrypted_zip(
        &layout.encrypted_path(ARCHIVE),
        &[("first.dat", b"first"), ("second.dat", b"second")],
        "secret",
    );

    let extractor = ZipExtractor;
    DecryptOrchestrator::new(&layout, &extractor)
        .run(&store(&["X secret"]))
        .unwrap();

    assert_eq!(fs::read(layout.decrypted_path(PAYLOAD)).unwrap(), b"first");
    assert_eq!(names(&layout.decrypted).len(), 1);
}

// ─── Test 8: crash between extract and move ─────────────────────────────────

#[test]
fn test_interrupted_relocation_is_retried() {
    let (_dir, layout) = setup();
    write_encrypted_zip(
        &layout.encrypted_path(ARCHIVE),
        &[("inner.dat", b"payload")],
        "secret",
    );

    // A previous cycle extracted the payload but died before moving it.
    let mut orphan = staging_file(&layout.staging).unwrap();
    orphan.write_all(b"payl").unwrap();
    orphan.keep().unwrap();

    let extractor = ZipExtractor;
    let orchestrator = DecryptOrchestrator::new(&layout, &extractor);
    assert_eq!(orchestrator.pending().unwrap().len(), 1);
    orchestrator.run(&store(&["X secret"])).unwrap();

    assert_eq!(fs::read(layout.decrypted_path(PAYLOAD)).unwrap(), b"payload");
    assert_eq!(cleanup_orphans(&layout.staging).unwrap(), 1);
    assert!(names(&layout.staging).is_empty());
}

#[test]
fn test_credentials_from_directory_drive_decryption() {
    let (_dir, layout) = setup();
    write_encrypted_zip(
        &layout.encrypted_path(ARCHIVE),
        &[("inner.dat", b"payload")],
        "secret",
    );
    fs::write(layout.passwords.join("x.pw"), "X secret\n").unwrap();
    fs::write(layout.passwords.join("broken.pw"), "X").unwrap();

    let load = load_credentials(&layout.passwords).unwrap();
    assert_eq!(load.skipped().count(), 1);

    let extractor = ZipExtractor;
    let outcomes = DecryptOrchestrator::new(&layout, &extractor)
        .run(&load.store)
        .unwrap();
    assert!(matches!(&outcomes[..], [DecryptOutcome::Decrypted { .. }]));
}

// ─── Test doubles ───────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingExtractor {
    opened: std::sync::atomic::AtomicUsize,
}

impl CountingExtractor {
    fn opened(&self) -> usize {
        self.opened.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Extractor for CountingExtractor {
    type Archive = <ZipExtractor as Extractor>::Archive;

    fn open(&self, path: &Path) -> Result<Self::Archive, ExtractError> {
        self.opened.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        ZipExtractor.open(path)
    }
}

struct ScriptedExtractor {
    failing: String,
}

struct ScriptedArchive {
    fail: bool,
}

impl Extractor for ScriptedExtractor {
    type Archive = ScriptedArchive;

    fn open(&self, path: &Path) -> Result<ScriptedArchive, ExtractError> {
        let name = path.file_name().unwrap().to_string_lossy();
        Ok(ScriptedArchive {
            fail: name == self.failing.as_str(),
        })
    }
}

impl EncryptedArchive for ScriptedArchive {
    fn members(&self) -> Vec<String> {
        vec!["inner.dat".into()]
    }

    fn extract(
        &mut self,
        _member: &str,
        _password: &[u8],
        out: &mut dyn Write,
    ) -> Result<u64, ExtractError> {
        if self.fail {
            return Err(ExtractError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "device unavailable",
            )));
        }
        out.write_all(b"ok")?;
        Ok(2)
    }
}

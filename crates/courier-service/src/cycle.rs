//! One reconciliation cycle: transfer, then decrypt.
//!
//! The cycle carries no state forward. Work sets are re-derived from the
//! directories every time and the credential store is loaded exactly once
//! per cycle so every archive in the batch sees the same snapshot.

use courier_core::archive::Extractor;
use courier_core::credentials::load_credentials;
use courier_core::decrypt::DecryptOrchestrator;
use courier_core::paths::Layout;
use courier_core::report::CycleReport;
use courier_core::transfer::TransferOrchestrator;
use courier_core::transport::Transport;
use tracing::{info, warn};

pub trait CycleRunner: Send + Sync + 'static {
    fn run_cycle(&self) -> CycleReport;
}

pub struct Agent<T, X> {
    layout: Layout,
    transport: T,
    extractor: X,
}

impl<T: Transport, X: Extractor> Agent<T, X> {
    pub fn new(layout: Layout, transport: T, extractor: X) -> Self {
        Self {
            layout,
            transport,
            extractor,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    fn transfer_phase(&self, report: &mut CycleReport) -> anyhow::Result<()> {
        let mut session = self.transport.connect()?;
        report.transfers = TransferOrchestrator::new(&self.layout).run(session.as_mut())?;
        Ok(())
    }

    fn decrypt_phase(&self, report: &mut CycleReport) -> anyhow::Result<()> {
        let credentials = load_credentials(&self.layout.passwords)?;
        if credentials.store.is_empty() {
            warn!(
                passwords = %self.layout.passwords.display(),
                "no credentials available, archives stay encrypted"
            );
        }
        report.credentials_loaded = credentials.store.len();
        report.credential_skips = credentials
            .skipped()
            .map(|(file, reason)| format!("{}: {reason}", file.display()))
            .collect();
        report.decrypts =
            DecryptOrchestrator::new(&self.layout, &self.extractor).run(&credentials.store)?;
        Ok(())
    }
}

impl<T, X> CycleRunner for Agent<T, X>
where
    T: Transport + 'static,
    X: Extractor + 'static,
{
    fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::begin();
        info!("checking drop location");

        if let Err(err) = self.transfer_phase(&mut report) {
            warn!(error = %format!("{err:#}"), "remote unavailable, retrying next cycle");
            report.aborted = Some(format!("{err:#}"));
            return report.finish();
        }

        if let Err(err) = self.decrypt_phase(&mut report) {
            warn!(error = %format!("{err:#}"), "decrypt phase could not run");
            report.decrypt_error = Some(format!("{err:#}"));
        }
        report.finish()
    }
}

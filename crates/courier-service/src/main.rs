use anyhow::{anyhow, Context, Result};
use clap::Parser;
use courier_core::archive::ZipExtractor;
use courier_core::paths::Layout;
use courier_core::relocate::cleanup_orphans;
use courier_service::cli::Cli;
use courier_service::cycle::{Agent, CycleRunner};
use courier_service::poll::{spawn_poll_loop, IntervalTicker};
use courier_service::sftp::SftpTransport;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let once = cli.once;
    let settings = cli.into_settings()?;

    let layout = Layout::new(&settings.root);
    layout
        .bootstrap()
        .context("cannot prepare data directories")?;
    cleanup_orphans(&layout.staging)?;

    let agent = Arc::new(Agent::new(
        layout,
        SftpTransport::new(&settings),
        ZipExtractor,
    ));

    if once {
        let report = tokio::task::spawn_blocking({
            let agent = agent.clone();
            move || agent.run_cycle()
        })
        .await?;
        report.log_summary();
        return match report.aborted {
            Some(reason) => Err(anyhow!("cycle aborted: {reason}")),
            None => Ok(()),
        };
    }

    info!(
        interval_secs = settings.interval_secs,
        "check for new data files to download and fresh archives to inflate"
    );
    let (task, handle) = spawn_poll_loop(
        agent,
        IntervalTicker::new(settings.interval()),
        |report| report.log_summary(),
    );

    signal::ctrl_c().await?;
    info!("stopping after the current cycle");
    handle.shutdown();
    task.await?;
    Ok(())
}

use clap::Parser;
use courier_core::settings::{AgentSettings, HostKeyPolicy};
use std::path::PathBuf;
use zeroize::Zeroizing;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Poll an SFTP drop for new data archives and inflate them once passwords are provided",
    long_about = None
)]
pub struct Cli {
    /// SFTP host
    pub host: String,
    /// SFTP username
    pub username: String,
    /// SFTP port
    pub port: u16,
    /// SFTP password
    pub password: String,

    /// Directory holding the `data/` tree
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Seconds between cycles
    #[arg(long)]
    pub interval: Option<u64>,
    /// OpenSSH known_hosts file used to verify the server
    #[arg(long, conflicts_with = "accept_unknown_host_key")]
    pub known_hosts: Option<PathBuf>,
    /// Skip host key verification (insecure)
    #[arg(long)]
    pub accept_unknown_host_key: bool,
    /// JSON settings file; command-line values take precedence
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    pub fn into_settings(self) -> anyhow::Result<AgentSettings> {
        let mut settings = match &self.settings {
            Some(path) => AgentSettings::load(path)?,
            None => AgentSettings::default(),
        };
        settings.remote.host = self.host;
        settings.remote.username = self.username;
        settings.remote.port = self.port;
        settings.remote.password = Zeroizing::new(self.password);
        if let Some(root) = self.root {
            settings.root = root;
        }
        if let Some(interval) = self.interval {
            settings.interval_secs = interval;
        }
        if let Some(path) = self.known_hosts {
            settings.host_key = HostKeyPolicy::KnownHosts(path);
        }
        if self.accept_unknown_host_key {
            settings.host_key = HostKeyPolicy::AcceptAny;
        }
        settings.validate()?;
        Ok(settings)
    }
}

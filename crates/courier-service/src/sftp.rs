//! SFTP transport built on libssh2.
//!
//! A fresh session is opened every cycle; nothing survives between cycles.
//! Host keys are checked against an OpenSSH known_hosts file unless the
//! operator explicitly opted out.

use courier_core::settings::{AgentSettings, HostKeyPolicy, RemoteSettings};
use courier_core::transport::{RemoteSession, Transport, TransportError};
use ssh2::{CheckResult, KnownHostFileKind, Session, Sftp};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

const CHUNK: usize = 64 * 1024;

pub struct SftpTransport {
    remote: RemoteSettings,
    host_key: HostKeyPolicy,
}

impl SftpTransport {
    pub fn new(settings: &AgentSettings) -> Self {
        if settings.host_key == HostKeyPolicy::AcceptAny {
            warn!("host key verification disabled; the server identity is not checked");
        }
        Self {
            remote: settings.remote.clone(),
            host_key: settings.host_key.clone(),
        }
    }

    fn target(&self) -> String {
        format!("{}:{}", self.remote.host, self.remote.port)
    }

    fn verify_host_key(&self, session: &Session) -> Result<(), TransportError> {
        let path = match &self.host_key {
            HostKeyPolicy::AcceptAny => return Ok(()),
            HostKeyPolicy::KnownHosts(path) => path,
        };
        let reject = |reason: String| TransportError::HostKey {
            host: self.remote.host.clone(),
            reason,
        };
        let mut known = session.known_hosts().map_err(|e| reject(e.to_string()))?;
        known
            .read_file(path, KnownHostFileKind::OpenSSH)
            .map_err(|e| reject(format!("read {}: {e}", path.display())))?;
        let (key, _) = session
            .host_key()
            .ok_or_else(|| reject("server sent no host key".into()))?;
        match known.check_port(&self.remote.host, self.remote.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::NotFound => Err(reject(format!("not present in {}", path.display()))),
            CheckResult::Mismatch => Err(reject("key does not match known_hosts entry".into())),
            CheckResult::Failure => Err(reject("known_hosts check failed".into())),
        }
    }
}

impl Transport for SftpTransport {
    fn connect(&self) -> Result<Box<dyn RemoteSession>, TransportError> {
        let target = self.target();
        let connect_err = |reason: String| TransportError::Connect {
            target: target.clone(),
            reason,
        };

        let tcp = TcpStream::connect((self.remote.host.as_str(), self.remote.port))
            .map_err(|e| connect_err(e.to_string()))?;
        let mut session = Session::new().map_err(|e| connect_err(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| connect_err(e.to_string()))?;

        self.verify_host_key(&session)?;

        session
            .userauth_password(&self.remote.username, &self.remote.password)
            .map_err(|e| TransportError::Auth {
                user: self.remote.username.clone(),
                reason: e.to_string(),
            })?;
        if !session.authenticated() {
            return Err(TransportError::Auth {
                user: self.remote.username.clone(),
                reason: "server did not accept credentials".into(),
            });
        }

        let sftp = session.sftp().map_err(|e| connect_err(e.to_string()))?;
        info!(remote = %target, "sftp session established");
        Ok(Box::new(SftpSession {
            _session: session,
            sftp,
        }))
    }
}

pub struct SftpSession {
    // Keeps the SSH connection alive for as long as the SFTP channel is used.
    _session: Session,
    sftp: Sftp,
}

impl RemoteSession for SftpSession {
    fn list(&mut self, dir: &str) -> Result<BTreeSet<String>, TransportError> {
        let entries = self
            .sftp
            .readdir(Path::new(dir))
            .map_err(|e| TransportError::List {
                path: dir.into(),
                reason: e.to_string(),
            })?;
        let names = entries
            .into_iter()
            .filter(|(_, stat)| stat.is_file())
            .filter_map(|(path, _)| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_owned)
            })
            .collect::<BTreeSet<_>>();
        debug!(dir, count = names.len(), "remote listing");
        Ok(names)
    }

    fn fetch(
        &mut self,
        remote: &str,
        local: &Path,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<u64, TransportError> {
        let fetch_err = |reason: String| TransportError::Fetch {
            path: remote.into(),
            reason,
        };
        let stat = self
            .sftp
            .stat(Path::new(remote))
            .map_err(|e| fetch_err(e.to_string()))?;
        let total = stat.size.unwrap_or(0);
        let mut src = self
            .sftp
            .open(Path::new(remote))
            .map_err(|e| fetch_err(e.to_string()))?;
        let mut dst = File::create(local).map_err(|e| fetch_err(e.to_string()))?;

        let mut buf = vec![0u8; CHUNK];
        let mut done = 0u64;
        progress(done, total);
        loop {
            let n = src.read(&mut buf).map_err(|e| fetch_err(e.to_string()))?;
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n])
                .map_err(|e| fetch_err(e.to_string()))?;
            done += n as u64;
            progress(done, total);
        }
        dst.sync_all().map_err(|e| fetch_err(e.to_string()))?;

        // Make local and remote agree on time.
        if let Some(mtime) = stat.mtime {
            let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(mtime);
            if let Err(e) = dst.set_modified(modified) {
                warn!(file = %local.display(), error = %e, "cannot preserve remote mtime");
            }
        }
        Ok(done)
    }
}

//! The named-pipe command channel.
//!
//! A Unix FIFO is created (0660) if missing. The reader task opens it
//! read-only (which blocks until a writer appears), then line-buffers and
//! forwards parsed commands to the scheduler loop. EOF (last writer closed)
//! triggers a reopen. Shutdown wakes a blocked open by briefly opening the
//! pipe write-only non-blocking.

use std::path::{Path, PathBuf};

use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::parser::parse_line;
use super::RawCommand;
use crate::error::VigilError;

/// Seconds to back off when the pipe cannot be opened.
const REOPEN_BACKOFF_SECS: u64 = 1;

/// The external-command FIFO.
pub struct CommandPipe {
    path: PathBuf,
}

impl CommandPipe {
    /// Ensure the FIFO exists at `path` (mkfifo 0660).
    pub fn create(path: &Path) -> Result<Self, VigilError> {
        if !path.exists() {
            nix::unistd::mkfifo(path, Mode::from_bits_truncate(0o660))
                .map_err(|e| VigilError::Io(std::io::Error::from(e)))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read commands until shutdown, forwarding them to `commands`.
    pub async fn run(self, commands: mpsc::UnboundedSender<RawCommand>, mut shutdown: broadcast::Receiver<()>) {
        info!(path = %self.path.display(), "command pipe reader started");
        loop {
            let mut open_opts = tokio::fs::OpenOptions::new();
            let open_fut = open_opts.read(true).open(&self.path);
            let file = tokio::select! {
                opened = open_fut => {
                    match opened {
                        Ok(f) => f,
                        Err(e) => {
                            warn!(path = %self.path.display(), error = %e, "cannot open command pipe, retrying");
                            tokio::time::sleep(std::time::Duration::from_secs(REOPEN_BACKOFF_SECS)).await;
                            continue;
                        }
                    }
                }
                _ = shutdown.recv() => break,
            };

            let mut lines = BufReader::new(file).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            match parse_line(line) {
                                Ok(cmd) => {
                                    if commands.send(cmd).is_err() {
                                        // Loop is gone; nothing left to feed.
                                        return;
                                    }
                                }
                                Err(e) => debug!(error = %e, "malformed pipe command dropped"),
                            }
                        }
                        // EOF: every writer closed; reopen and block again.
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "command pipe read failed, reopening");
                            break;
                        }
                    },
                    _ = shutdown.recv() => return,
                }
            }
        }
        info!("command pipe reader stopped");
    }

    /// Wake a reader blocked in open(2) during shutdown by connecting a
    /// non-blocking writer. The returned fd closes on drop.
    pub fn unblock(&self) {
        let _ = nix::fcntl::open(
            &self.path,
            OFlag::O_WRONLY | OFlag::O_NONBLOCK,
            Mode::empty(),
        );
    }
}

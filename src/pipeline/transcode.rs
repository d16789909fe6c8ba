//! Media transcoding through an ffmpeg process confined to a scratch directory.
//!
//! The transcoder works on a private file system: callers write the input
//! under a plain name, run ffmpeg with arguments that refer to those names and
//! read the output back. Each [`FfmpegSandbox`] owns its own temporary
//! directory, which is removed when the sandbox is dropped.

use crate::error::EngineError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Names accepted inside the sandbox: no separators, no leading dot.
static SANDBOX_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap());

/// Lines of ffmpeg stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

/// An ffmpeg-like engine with a private file system.
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Make sure the engine can run. Safe to call more than once.
    async fn load(&self) -> Result<(), EngineError>;

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError>;

    /// Run one command. `args` are the arguments after the program name.
    async fn run(&self, args: &[String]) -> Result<(), EngineError>;

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    async fn remove_file(&self, name: &str) -> Result<(), EngineError>;
}

/// [`MediaTranscoder`] backed by an ffmpeg executable.
pub struct FfmpegSandbox {
    dir: TempDir,
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegSandbox {
    /// Create a sandbox. `binary` defaults to `ffmpeg` on `PATH`.
    pub fn new(binary: Option<PathBuf>, timeout: Duration) -> Result<Self, EngineError> {
        let dir = tempfile::Builder::new().prefix("edgeconv-").tempdir()?;
        Ok(Self {
            dir,
            binary: binary.unwrap_or_else(|| PathBuf::from("ffmpeg")),
            timeout,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, EngineError> {
        if !SANDBOX_NAME.is_match(name) {
            return Err(EngineError::InvalidFileName(name.to_string()));
        }
        Ok(self.dir.path().join(name))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(self.dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> EngineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::Unavailable(format!(
                "ffmpeg not found at '{}'; install ffmpeg or set EDGECONV_FFMPEG",
                self.binary.display()
            ))
        } else {
            EngineError::Io(e)
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n").trim().to_string()
}

#[async_trait]
impl MediaTranscoder for FfmpegSandbox {
    async fn load(&self) -> Result<(), EngineError> {
        let output = self
            .command()
            .arg("-version")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(EngineError::Unavailable(format!(
                "'{} -version' failed: {}",
                self.binary.display(),
                stderr_tail(&output.stderr)
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        info!(
            "ffmpeg ready: {}",
            version.lines().next().unwrap_or("unknown version")
        );
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, data).await?;
        debug!("sandbox write {} ({} bytes)", name, data.len());
        Ok(())
    }

    async fn run(&self, args: &[String]) -> Result<(), EngineError> {
        let mut cmd = self.command();
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"]).args(args);
        debug!("ffmpeg {}", args.join(" "));

        let started = Instant::now();
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| self.spawn_error(e))?,
            Err(_) => {
                // Dropping the output future kills the child.
                warn!("ffmpeg exceeded {:?}, killed", self.timeout);
                return Err(EngineError::Timeout {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
        };

        if !output.status.success() {
            return Err(EngineError::Process {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        debug!("ffmpeg finished in {}ms", started.elapsed().as_millis());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.resolve(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn remove_file(&self, name: &str) -> Result<(), EngineError> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

//! Best-effort notification sounds.
//!
//! Playback never matters enough to fail the caller. Players report
//! `PlatformError::Playback` (or `NotSupported` where no player exists) and
//! callers log and drop it.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use los_common::PlatformError;
use tracing::debug;

#[async_trait]
pub trait SoundPlayer: Send + Sync {
    async fn play(&self) -> Result<(), PlatformError>;
}

/// Rings the terminal bell.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

#[async_trait]
impl SoundPlayer for TerminalBell {
    async fn play(&self) -> Result<(), PlatformError> {
        let mut out = std::io::stdout();
        out.write_all(b"\x07")
            .and_then(|_| out.flush())
            .map_err(|e| PlatformError::Playback(format!("terminal bell: {e}")))
    }
}

/// Plays nothing. Used when sounds are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct MutedPlayer;

#[async_trait]
impl SoundPlayer for MutedPlayer {
    async fn play(&self) -> Result<(), PlatformError> {
        Ok(())
    }
}

/// Plays an audio file through the platform's command-line player.
///
/// - macOS: `afplay`
/// - Linux: `paplay`
/// - Other platforms: not supported.
#[derive(Debug, Clone)]
pub struct FilePlayer {
    path: PathBuf,
}

impl FilePlayer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SoundPlayer for FilePlayer {
    async fn play(&self) -> Result<(), PlatformError> {
        if !self.path.exists() {
            return Err(PlatformError::Playback(format!(
                "sound file not found: {}",
                self.path.display()
            )));
        }

        let program = player_program()?;
        let output = tokio::process::Command::new(program)
            .arg(&self.path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PlatformError::Playback(format!("failed to run {program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlatformError::Playback(format!(
                "{program} failed: {}",
                stderr.trim()
            )));
        }

        debug!(path = %self.path.display(), "notification sound played");
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn player_program() -> Result<&'static str, PlatformError> {
    Ok("afplay")
}

#[cfg(target_os = "linux")]
fn player_program() -> Result<&'static str, PlatformError> {
    Ok("paplay")
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn player_program() -> Result<&'static str, PlatformError> {
    Err(PlatformError::NotSupported(
        "file playback on this platform".into(),
    ))
}

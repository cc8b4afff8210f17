//! Built-in alert channels for headless hosts.

use std::process::{Command, Stdio};

use super::{Haptics, Notifier, Permission, Speaker};
use crate::error::NotificationError;

/// No vibration hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn vibrate(&self, _pattern: &[u64]) -> Result<(), NotificationError> {
        Err(NotificationError::Unsupported { channel: "vibration" })
    }
}

/// Records the vibration pattern in the log instead of buzzing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHaptics;

impl Haptics for LogHaptics {
    fn vibrate(&self, pattern: &[u64]) -> Result<(), NotificationError> {
        tracing::info!(?pattern, "vibrate");
        Ok(())
    }
}

/// Writes notifications to stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    permission: Permission,
}

impl ConsoleNotifier {
    pub fn granted() -> Self {
        Self {
            permission: Permission::Granted,
        }
    }

    pub fn denied() -> Self {
        Self {
            permission: Permission::Denied,
        }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::granted()
    }
}

impl Notifier for ConsoleNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn show(&self, title: &str, body: &str) -> Result<(), NotificationError> {
        eprintln!("{title}: {body}");
        Ok(())
    }
}

/// No speech synthesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSpeaker;

impl Speaker for SilentSpeaker {
    fn speak(&self, _text: &str) -> Result<(), NotificationError> {
        Err(NotificationError::Unsupported { channel: "speech" })
    }
}

/// Speaks through an external program such as `espeak` or `say`.
/// The phrase is appended as the final argument.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    /// Split a whitespace-separated command line. Returns `None` when blank.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, text: &str) -> Result<(), NotificationError> {
        let failed = |message: String| NotificationError::Failed {
            channel: "speech",
            message,
        };
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| failed(format!("{}: {e}", self.program)))?;
        if !status.success() {
            return Err(failed(format!("{} exited with {status}", self.program)));
        }
        Ok(())
    }
}

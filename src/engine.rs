//! Fingerprint engine seam.
//!
//! [`FingerprintEngine`] is the one call the pipeline makes per record.
//! [`CommandEngine`] adapts it to a long-lived helper process that speaks a
//! line protocol on its stdin/stdout:
//!
//! ```text
//! engine -> ready[ <software>]
//! caller -> <flavor-code>\t<bit-length>\t<structure>
//! engine -> 1 <hex>          (encoded, ceil(bit-length / 8) bytes)
//!         | 0                (structure could not be encoded)
//! ```
//!
//! The helper is started once, before the first record, and is shut down
//! by closing its stdin when the adapter is dropped. It must exit on EOF;
//! one still running after `shutdown_timeout_ms` (see [`EngineConfig`]) is
//! killed.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::EngineConfig;
use crate::flavor::FingerprintSpec;

/// Errors raised by an engine adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not launch engine `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("engine `{command}` failed to start: {reason}")]
    Handshake { command: String, reason: String },

    #[error("engine i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("engine closed its output")]
    Closed,

    #[error("malformed engine response: {0:?}")]
    Protocol(String),

    #[error("structure text contains a line break")]
    LineBreak,
}

/// Result of one engine call.
///
/// When `ok` is false the bytes carry no meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFingerprint {
    pub bytes: Vec<u8>,
    pub ok: bool,
}

impl EncodedFingerprint {
    pub fn encoded(bytes: Vec<u8>) -> Self {
        Self { bytes, ok: true }
    }

    pub fn rejected() -> Self {
        Self {
            bytes: Vec::new(),
            ok: false,
        }
    }

    /// True when the engine succeeded and produced exactly
    /// `spec.byte_len()` bytes.
    pub fn is_valid_for(&self, spec: &FingerprintSpec) -> bool {
        self.ok && self.bytes.len() == spec.byte_len()
    }
}

/// Synchronous structure-to-fingerprint capability.
///
/// Calls are strictly sequential; implementations need not be `Sync`.
pub trait FingerprintEngine {
    fn encode(
        &mut self,
        structure: &str,
        spec: &FingerprintSpec,
    ) -> Result<EncodedFingerprint, EngineError>;
}

impl<E: FingerprintEngine + ?Sized> FingerprintEngine for &mut E {
    fn encode(
        &mut self,
        structure: &str,
        spec: &FingerprintSpec,
    ) -> Result<EncodedFingerprint, EngineError> {
        (**self).encode(structure, spec)
    }
}

impl<E: FingerprintEngine + ?Sized> FingerprintEngine for Box<E> {
    fn encode(
        &mut self,
        structure: &str,
        spec: &FingerprintSpec,
    ) -> Result<EncodedFingerprint, EngineError> {
        (**self).encode(structure, spec)
    }
}

/// Engine backed by a helper process.
#[derive(Debug)]
pub struct CommandEngine {
    command: String,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
    software: Option<String>,
    response: String,
    shutdown_timeout: Duration,
}

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

impl CommandEngine {
    /// Starts the helper and waits for its `ready` line.
    pub fn spawn(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                command: config.command.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Handshake {
                command: config.command.clone(),
                reason: "stdio pipes unavailable".to_string(),
            });
        };

        let mut engine = Self {
            command: config.command.clone(),
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
            software: None,
            response: String::new(),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
        };
        if let Err(err) = engine.handshake() {
            let _ = engine.child.kill();
            return Err(err);
        }
        tracing::info!(
            command = %engine.command,
            pid = engine.child.id(),
            software = engine.software.as_deref().unwrap_or("-"),
            "fingerprint engine ready"
        );
        Ok(engine)
    }

    /// Software identifier the helper announced in its `ready` line.
    pub fn software(&self) -> Option<&str> {
        self.software.as_deref()
    }

    fn handshake(&mut self) -> Result<(), EngineError> {
        let command = self.command.clone();
        let fail = move |reason: String| EngineError::Handshake {
            command: command.clone(),
            reason,
        };
        let line = match self.read_response() {
            Ok(line) => line,
            Err(EngineError::Closed) => return Err(fail("exited before ready".to_string())),
            Err(err) => return Err(fail(err.to_string())),
        };

        match line.strip_prefix("ready") {
            Some("") => Ok(()),
            Some(rest) if rest.starts_with(' ') => {
                let software = rest.trim();
                if !software.is_empty() {
                    self.software = Some(software.to_string());
                }
                Ok(())
            }
            _ => Err(fail(format!("unexpected greeting {line:?}"))),
        }
    }

    fn read_response(&mut self) -> Result<String, EngineError> {
        self.response.clear();
        if self.stdout.read_line(&mut self.response)? == 0 {
            return Err(EngineError::Closed);
        }
        Ok(self.response.trim_end_matches(['\n', '\r']).to_string())
    }

    /// Waits up to `shutdown_timeout` for the helper to exit, then kills it.
    fn reap(&mut self) -> io::Result<ExitStatus> {
        // An overflowing deadline means wait forever.
        let deadline = Instant::now().checked_add(self.shutdown_timeout);
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
        tracing::warn!(
            command = %self.command,
            timeout_ms = self.shutdown_timeout.as_millis() as u64,
            "fingerprint engine ignored end of input, killing it"
        );
        self.child.kill()?;
        self.child.wait()
    }
}

impl FingerprintEngine for CommandEngine {
    fn encode(
        &mut self,
        structure: &str,
        spec: &FingerprintSpec,
    ) -> Result<EncodedFingerprint, EngineError> {
        if structure.contains(['\n', '\r']) {
            return Err(EngineError::LineBreak);
        }
        let stdin = self.stdin.as_mut().ok_or(EngineError::Closed)?;
        writeln!(
            stdin,
            "{}\t{}\t{}",
            spec.flavor().code(),
            spec.bit_length(),
            structure
        )?;
        stdin.flush()?;

        let line = self.read_response()?;
        parse_response(&line)
    }
}

impl Drop for CommandEngine {
    fn drop(&mut self) {
        // EOF on stdin is the helper's signal to exit.
        drop(self.stdin.take());
        match self.reap() {
            Ok(status) if status.success() => {
                tracing::debug!(command = %self.command, "fingerprint engine exited");
            }
            Ok(status) => {
                tracing::warn!(command = %self.command, %status, "fingerprint engine exited abnormally");
            }
            Err(err) => {
                tracing::warn!(command = %self.command, error = %err, "failed to reap fingerprint engine");
            }
        }
    }
}

fn parse_response(line: &str) -> Result<EncodedFingerprint, EngineError> {
    if line == "0" {
        return Ok(EncodedFingerprint::rejected());
    }
    let hex_digits = line
        .strip_prefix("1 ")
        .ok_or_else(|| EngineError::Protocol(line.to_string()))?;
    let bytes = hex::decode(hex_digits.trim())
        .map_err(|_| EngineError::Protocol(line.to_string()))?;
    Ok(EncodedFingerprint::encoded(bytes))
}

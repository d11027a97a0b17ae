//! Converts a stream of chemical structure records into an FPS1
//! fingerprint file.
//!
//! Each input line is handed to a [`FingerprintEngine`] as-is. Successful
//! fingerprints are written as `<hex><separator><title>` lines under a
//! `#FPS1` header; records the engine cannot encode are reported on the
//! diagnostic stream as `Error: <line>` and skipped. Records are carried as
//! raw bytes, so titles and diagnostics repeat the input exactly; only the
//! engine sees a (lossily decoded) text view.
//!
//! ## Invariants worth knowing
//!
//! - The [`FingerprintSpec`] is built once and never changes during a run
//! - Every hex field is exactly `2 * ceil(bit_length / 8)` characters
//! - Output order is input order; a failed record never stops the run
//! - Per-record trouble is logged at `debug` at most, so a default run's
//!   stderr carries nothing but the `Error:` lines
//!
//! ```
//! use std::io::Cursor;
//! use smi2fps::{
//!     EncodedFingerprint, EngineError, FingerprintEngine, FingerprintSpec, Flavor, LineReader,
//!     convert,
//! };
//!
//! struct Zeros;
//!
//! impl FingerprintEngine for Zeros {
//!     fn encode(
//!         &mut self,
//!         _structure: &str,
//!         spec: &FingerprintSpec,
//!     ) -> Result<EncodedFingerprint, EngineError> {
//!         Ok(EncodedFingerprint::encoded(vec![0; spec.byte_len()]))
//!     }
//! }
//!
//! let spec = FingerprintSpec::new(Flavor::Ecfp4, 16).unwrap();
//! let reader = LineReader::new(Cursor::new("CCO ethanol\n"));
//! let mut out = Vec::new();
//! let summary = convert(spec, reader, &mut out, Zeros, "doc", std::io::sink()).unwrap();
//!
//! assert_eq!(summary.encoded, 1);
//! assert!(String::from_utf8(out).unwrap().ends_with("0000 ethanol\n"));
//! ```

mod config;
mod engine;
mod flavor;
mod reader;
mod stream;
mod writer;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;

pub use crate::config::{
    ConfigError, DEFAULT_ENGINE_COMMAND, DEFAULT_SHUTDOWN_TIMEOUT_MS, ENGINE_CONFIG_ENV,
    EngineConfig, Invocation, RunConfig, StreamSelector, resolve_args, usage,
};
pub use crate::engine::{CommandEngine, EncodedFingerprint, EngineError, FingerprintEngine};
pub use crate::flavor::{
    DEFAULT_BIT_LENGTH, FingerprintSpec, Flavor, MACCS_BIT_LENGTH, PUBCHEM_BIT_LENGTH, byte_len,
};
pub use crate::reader::{LineReader, TrailingLine};
pub use crate::stream::{open_input, open_output};
pub use crate::writer::{FpsWriter, SOFTWARE, split_title};

/// Records between progress events.
pub const PROGRESS_INTERVAL: u64 = 5000;

/// Errors that end a conversion run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("fingerprint engine initialization failed: {0}")]
    EngineInit(#[source] EngineError),

    #[error("failed to read input: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write output: {0}")]
    Write(#[source] io::Error),
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Records framed from the input.
    pub records: u64,
    /// Records written to the output.
    pub encoded: u64,
    /// Records reported on the diagnostic stream.
    pub failed: u64,
    pub elapsed: Duration,
}

/// Drives records from a [`LineReader`] through an engine into an
/// [`FpsWriter`].
#[derive(Debug)]
pub struct RecordProcessor<E> {
    spec: FingerprintSpec,
    engine: E,
    progress_interval: u64,
}

impl<E: FingerprintEngine> RecordProcessor<E> {
    pub fn new(spec: FingerprintSpec, engine: E) -> Self {
        Self {
            spec,
            engine,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Emit a progress event every `interval` records (0 disables).
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn spec(&self) -> &FingerprintSpec {
        &self.spec
    }

    /// Processes every remaining record. The header must already be written.
    ///
    /// Only read and write failures abort; engine failures are reported on
    /// `diagnostics` and counted.
    pub fn run<R, W, D>(
        &mut self,
        reader: &mut LineReader<R>,
        writer: &mut FpsWriter<W>,
        diagnostics: &mut D,
    ) -> Result<RunSummary, PipelineError>
    where
        R: BufRead,
        W: Write,
        D: Write,
    {
        let start = Instant::now();
        let mut summary = RunSummary::default();
        let mut line = Vec::new();

        while reader.read_line(&mut line).map_err(PipelineError::Read)? {
            summary.records += 1;

            if self.encode_one(&line, writer, summary.records)? {
                summary.encoded += 1;
            } else {
                summary.failed += 1;
                report_failure(diagnostics, &line).map_err(PipelineError::Write)?;
            }

            if self.progress_interval > 0 && summary.records % self.progress_interval == 0 {
                tracing::info!(
                    records = summary.records,
                    failed = summary.failed,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "progress"
                );
            }
        }

        summary.elapsed = start.elapsed();
        Ok(summary)
    }

    fn encode_one<W: Write>(
        &mut self,
        line: &[u8],
        writer: &mut FpsWriter<W>,
        record: u64,
    ) -> Result<bool, PipelineError> {
        let structure = String::from_utf8_lossy(line);
        match self.engine.encode(&structure, &self.spec) {
            Ok(fp) if fp.is_valid_for(&self.spec) => {
                writer
                    .write_record(&fp.bytes, line)
                    .map_err(PipelineError::Write)?;
                Ok(true)
            }
            Ok(fp) => {
                if fp.ok {
                    tracing::debug!(
                        record,
                        expected = self.spec.byte_len(),
                        actual = fp.bytes.len(),
                        "engine returned a fingerprint of the wrong size"
                    );
                } else {
                    tracing::debug!(record, "engine could not encode record");
                }
                Ok(false)
            }
            Err(err) => {
                tracing::debug!(record, error = %err, "engine call failed");
                Ok(false)
            }
        }
    }

    pub fn into_engine(self) -> E {
        self.engine
    }
}

fn report_failure<D: Write>(diagnostics: &mut D, line: &[u8]) -> io::Result<()> {
    diagnostics.write_all(b"Error: ")?;
    diagnostics.write_all(line)?;
    diagnostics.write_all(b"\n")
}

/// Writes the header, converts every record and flushes the output.
pub fn convert<R, W, D, E>(
    spec: FingerprintSpec,
    mut reader: LineReader<R>,
    output: W,
    engine: E,
    software: &str,
    mut diagnostics: D,
) -> Result<RunSummary, PipelineError>
where
    R: BufRead,
    W: Write,
    D: Write,
    E: FingerprintEngine,
{
    let mut writer = FpsWriter::new(output, spec);
    writer
        .write_header(software)
        .map_err(PipelineError::Write)?;

    let mut processor = RecordProcessor::new(spec, engine);
    let summary = processor.run(&mut reader, &mut writer, &mut diagnostics)?;

    writer.flush().map_err(PipelineError::Write)?;
    diagnostics.flush().map_err(PipelineError::Write)?;

    tracing::info!(
        records = summary.records,
        encoded = summary.encoded,
        failed = summary.failed,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "conversion finished"
    );
    Ok(summary)
}

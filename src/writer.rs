//! FPS1 output: a four line `#` header followed by one
//! `<hex><separator><title>` line per fingerprint.

use std::io::{self, ErrorKind, Write};

use crate::flavor::FingerprintSpec;

/// Default value of the `#software=` header line.
pub const SOFTWARE: &str = concat!("smi2fps/", env!("CARGO_PKG_VERSION"));

/// Returns the separator and title of a record, i.e. everything from the
/// first space or tab (inclusive) to the end of `structure`.
///
/// `None` when the structure text holds no space or tab. Bytes are returned
/// unchanged, whatever their encoding.
pub fn split_title(structure: &[u8]) -> Option<&[u8]> {
    structure
        .iter()
        .position(|&b| b == b' ' || b == b'\t')
        .map(|idx| &structure[idx..])
}

/// Serializes fingerprints for one [`FingerprintSpec`].
#[derive(Debug)]
pub struct FpsWriter<W> {
    inner: W,
    spec: FingerprintSpec,
    hex: Vec<u8>,
    records: u64,
}

impl<W: Write> FpsWriter<W> {
    pub fn new(inner: W, spec: FingerprintSpec) -> Self {
        Self {
            inner,
            hex: vec![0; spec.hex_len()],
            spec,
            records: 0,
        }
    }

    /// Writes the `#FPS1` header block. Call once, before any record.
    pub fn write_header(&mut self, software: &str) -> io::Result<()> {
        write!(
            self.inner,
            "#FPS1\n#num_bits={}\n#type={}\n#software={}\n",
            self.spec.bit_length(),
            self.spec.flavor().fps_type(),
            software
        )
    }

    /// Writes one record line.
    ///
    /// `fingerprint` must be exactly `spec.byte_len()` bytes, most
    /// significant byte first.
    pub fn write_record(&mut self, fingerprint: &[u8], structure: &[u8]) -> io::Result<()> {
        if fingerprint.len() != self.spec.byte_len() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "fingerprint is {} bytes, expected {} for {} bits",
                    fingerprint.len(),
                    self.spec.byte_len(),
                    self.spec.bit_length()
                ),
            ));
        }
        hex::encode_to_slice(fingerprint, &mut self.hex)
            .map_err(|err| io::Error::new(ErrorKind::InvalidInput, err))?;

        self.inner.write_all(&self.hex)?;
        match split_title(structure) {
            Some(title) => self.inner.write_all(title)?,
            None => {
                self.inner.write_all(b" ")?;
                self.inner.write_all(structure)?;
            }
        }
        self.inner.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    /// Number of record lines written.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

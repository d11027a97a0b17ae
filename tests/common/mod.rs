#![allow(dead_code)]

use std::io::Cursor;

use smi2fps::{
    EncodedFingerprint, EngineError, FingerprintEngine, FingerprintSpec, LineReader, RunSummary,
    convert,
};

/// Deterministic stand-in for a real fingerprinter.
///
/// Rejects empty structures and anything containing `bad`; otherwise sets
/// bits from a running byte hash of the structure text (title included).
#[derive(Debug, Default)]
pub struct HashEngine {
    pub calls: usize,
}

impl FingerprintEngine for HashEngine {
    fn encode(
        &mut self,
        structure: &str,
        spec: &FingerprintSpec,
    ) -> Result<EncodedFingerprint, EngineError> {
        self.calls += 1;
        if structure.is_empty() || structure.contains("bad") {
            return Ok(EncodedFingerprint::rejected());
        }

        let mut bytes = vec![0u8; spec.byte_len()];
        let mut state: u32 = 0x811c_9dc5;
        for b in structure.bytes() {
            state = (state ^ u32::from(b)).wrapping_mul(0x0100_0193);
            let bit = (state % spec.bit_length()) as usize;
            bytes[bit / 8] |= 1 << (bit % 8);
        }
        Ok(EncodedFingerprint::encoded(bytes))
    }
}

pub struct Converted {
    pub output: String,
    pub diagnostics: String,
    pub summary: RunSummary,
}

/// Runs a whole conversion over `input` with [`HashEngine`].
pub fn convert_str(spec: FingerprintSpec, input: &str) -> Converted {
    let mut output = Vec::new();
    let mut diagnostics = Vec::new();
    let summary = convert(
        spec,
        LineReader::new(Cursor::new(input.as_bytes().to_vec())),
        &mut output,
        HashEngine::default(),
        "smi2fps-test",
        &mut diagnostics,
    )
    .expect("in-memory conversion succeeds");

    Converted {
        output: String::from_utf8(output).expect("FPS output is UTF-8"),
        diagnostics: String::from_utf8(diagnostics).expect("diagnostics are UTF-8"),
        summary,
    }
}

/// Record lines of an FPS1 document (header dropped).
pub fn records(output: &str) -> Vec<&str> {
    output.lines().filter(|line| !line.starts_with('#')).collect()
}

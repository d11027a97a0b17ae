//! Opening the input and output streams named on the command line.
//!
//! Open failures are returned immediately; nothing downstream ever sees a
//! half-opened stream.

use std::fs::File;
use std::io::{self, BufRead, BufReader, LineWriter, Write};

use crate::PipelineError;
use crate::config::StreamSelector;

/// Opens the input for binary reading, stdin for [`StreamSelector::Std`].
pub fn open_input(selector: &StreamSelector) -> Result<Box<dyn BufRead>, PipelineError> {
    match selector {
        StreamSelector::Std => Ok(Box::new(io::stdin().lock())),
        StreamSelector::Path(path) => {
            let file = File::open(path).map_err(|source| PipelineError::Open {
                path: path.clone(),
                source,
            })?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

/// Opens (creating or truncating) the output, stdout for
/// [`StreamSelector::Std`]. Output is flushed at every line end.
pub fn open_output(selector: &StreamSelector) -> Result<Box<dyn Write>, PipelineError> {
    match selector {
        StreamSelector::Std => Ok(Box::new(LineWriter::new(io::stdout().lock()))),
        StreamSelector::Path(path) => {
            let file = File::create(path).map_err(|source| PipelineError::Open {
                path: path.clone(),
                source,
            })?;
            Ok(Box::new(LineWriter::new(file)))
        }
    }
}

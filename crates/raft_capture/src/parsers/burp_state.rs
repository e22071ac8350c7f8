use std::path::Path;

use super::RawRecordStream;
use crate::{FormatId, IngestLimits, ParserStreamError};

/// Burp saved state is a proprietary container; the format stays registered
/// so selecting it fails loudly instead of silently doing nothing.
pub fn parse(path: &Path, _limits: &IngestLimits) -> Result<RawRecordStream, ParserStreamError> {
    Err(ParserStreamError::Unsupported {
        format: FormatId::BurpState,
        path: path.to_path_buf(),
    })
}

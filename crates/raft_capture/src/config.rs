use serde::Deserialize;

/// Memory bounds applied while streaming capture files.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestLimits {
    /// Longest line accepted from a line-oriented log before the stream fails.
    pub max_line_bytes: usize,
}

impl IngestLimits {
    pub const DEFAULT_MAX_LINE_BYTES: usize = 8 * 1024 * 1024;
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: Self::DEFAULT_MAX_LINE_BYTES,
        }
    }
}

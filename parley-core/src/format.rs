//! Response formatting: line-ending and fence normalization followed by
//! fence-aware chunking to the transport's per-message limit.

pub mod chunk;

pub use chunk::{ChunkLimits, Chunks};

use crate::config::FormatConfig;

/// Code fence marker.
pub const FENCE: &str = "```";

/// Normalize line endings and balance code fences.
///
/// `\r\n` and lone `\r` become `\n`. If the text contains an odd number of
/// fence markers, `"\n```"` is appended so the last block is closed.
/// Applying it twice gives the same result as applying it once.
///
/// # Examples
///
/// ```
/// use parley_core::format::normalize;
///
/// assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc");
/// assert_eq!(normalize("```rust\nfn main() {}"), "```rust\nfn main() {}\n```");
/// assert_eq!(normalize("abc```code```def"), "abc```code```def");
/// ```
pub fn normalize(text: &str) -> String {
    let mut normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    if normalized.matches(FENCE).count() % 2 == 1 {
        normalized.push('\n');
        normalized.push_str(FENCE);
    }
    normalized
}

/// Turns a raw completion reply into transport-sized chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseFormatter {
    limits: ChunkLimits,
    reopen_fences: bool,
}

impl ResponseFormatter {
    /// Create a formatter with explicit limits.
    pub fn new(limits: ChunkLimits, reopen_fences: bool) -> Self {
        Self {
            limits,
            reopen_fences,
        }
    }

    /// Create a formatter from the `[format]` config section.
    pub fn from_config(config: &FormatConfig) -> Self {
        Self::new(
            ChunkLimits {
                soft: config.soft_limit,
                hard: config.hard_limit,
            },
            config.reopen_fences,
        )
    }

    /// Limits in effect.
    pub fn limits(&self) -> ChunkLimits {
        self.limits
    }

    /// Normalize `text` and split it into ordered chunks.
    ///
    /// Returns an empty vector for empty input; otherwise no chunk is empty
    /// and none exceeds the hard limit.
    pub fn format(&self, text: &str) -> Vec<String> {
        let normalized = normalize(text);
        Chunks::new(&normalized, self.limits, self.reopen_fences).collect()
    }
}

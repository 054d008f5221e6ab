//! Fence-aware chunking for the transport's per-message limit.
//!
//! Text is walked line by line. Chunks aim for the soft limit and never exceed
//! the hard limit; the gap between the two absorbs a closing fence line so a
//! code block is not cut right before its end.

use std::str::SplitInclusive;

use super::FENCE;

/// Longest opening fence line (language tag included) reused when reopening.
const MAX_REOPEN_MARKER: usize = 32;

/// Soft and hard chunk sizes, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    /// Preferred maximum; ordinary lines are never appended past it.
    pub soft: usize,
    /// Absolute maximum per chunk.
    pub hard: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            soft: 1900,
            hard: 2000,
        }
    }
}

/// A line, or a soft-limit sized piece of an overlong line.
struct Segment<'a> {
    text: &'a str,
    len: usize,
    line_start: bool,
}

impl Segment<'_> {
    fn is_fence(&self) -> bool {
        self.line_start && self.text.trim_start().starts_with(FENCE)
    }
}

/// Lines with their terminators, cut to at most `max` characters each.
struct Segments<'a> {
    lines: SplitInclusive<'a, char>,
    pending: &'a str,
    max: usize,
}

impl<'a> Segments<'a> {
    fn new(text: &'a str, max: usize) -> Self {
        Self {
            lines: text.split_inclusive('\n'),
            pending: "",
            max: max.max(1),
        }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (rest, line_start) = if self.pending.is_empty() {
            (self.lines.next()?, true)
        } else {
            (self.pending, false)
        };

        match rest.char_indices().nth(self.max) {
            Some((cut, _)) => {
                self.pending = &rest[cut..];
                Some(Segment {
                    text: &rest[..cut],
                    len: self.max,
                    line_start,
                })
            }
            None => {
                self.pending = "";
                Some(Segment {
                    text: rest,
                    len: rest.chars().count(),
                    line_start,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FenceState {
    Outside,
    /// Inside a block; holds the line that reopens it.
    Inside { reopen: String },
}

/// Iterator over the chunks of a text.
///
/// Text no longer than the hard limit comes back as a single chunk. Longer
/// text is split on line boundaries:
///
/// - an ordinary or opening fence line that would push the chunk past the soft
///   limit starts a new chunk;
/// - a closing fence line is kept with its block unless that would pass the
///   hard limit, and the chunk is emitted right after it if it is over the
///   soft limit;
/// - a line longer than the soft limit is cut into soft-limit pieces.
///
/// With `reopen_fences` disabled the chunks concatenate back to the input.
/// When enabled, a split inside a code block closes the block at the end of
/// the outgoing chunk and reopens it (language tag included) at the start of
/// the next one.
///
/// # Examples
///
/// ```
/// use parley_core::format::{ChunkLimits, Chunks};
///
/// let limits = ChunkLimits { soft: 12, hard: 20 };
/// let text = "first line\nsecond line\nthird\n";
/// let chunks: Vec<String> = Chunks::new(text, limits, false).collect();
///
/// assert_eq!(chunks, ["first line\n", "second line\n", "third\n"]);
/// assert!(Chunks::new("", limits, false).next().is_none());
/// ```
pub struct Chunks<'a> {
    whole: Option<&'a str>,
    segments: Segments<'a>,
    hard: usize,
    soft: usize,
    reopen_fences: bool,
    fence: FenceState,
    current: String,
    current_len: usize,
}

impl<'a> Chunks<'a> {
    /// Start chunking `text`.
    pub fn new(text: &'a str, limits: ChunkLimits, reopen_fences: bool) -> Self {
        let whole = (text.chars().count() <= limits.hard).then_some(text);
        // The short path never walks the segments.
        let body = if whole.is_some() { "" } else { text };
        Self {
            whole,
            segments: Segments::new(body, limits.soft),
            hard: limits.hard,
            soft: limits.soft.max(1),
            reopen_fences,
            fence: FenceState::Outside,
            current: String::new(),
            current_len: 0,
        }
    }

    fn append(&mut self, segment: &Segment<'_>) {
        self.current.push_str(segment.text);
        self.current_len += segment.len;
    }

    /// Emit the accumulated chunk at a split point.
    fn split(&mut self) -> Option<String> {
        if self.current.is_empty() {
            return None;
        }
        let mut chunk = std::mem::take(&mut self.current);
        self.current_len = 0;

        if self.reopen_fences
            && let FenceState::Inside { reopen } = &self.fence
        {
            if !chunk.ends_with('\n') {
                chunk.push('\n');
            }
            chunk.push_str(FENCE);
            self.current.push_str(reopen);
            self.current_len = reopen.chars().count();
        }
        Some(chunk)
    }

    fn step(&mut self, segment: Segment<'_>) -> Option<String> {
        let over_soft = self.current_len + segment.len > self.soft;

        if !segment.is_fence() {
            let out = if over_soft { self.split() } else { None };
            self.append(&segment);
            return out;
        }

        match self.fence {
            FenceState::Outside => {
                let out = if over_soft { self.split() } else { None };
                self.append(&segment);
                self.fence = FenceState::Inside {
                    reopen: reopen_marker(segment.text),
                };
                out
            }
            FenceState::Inside { .. } => {
                if self.current_len + segment.len > self.hard
                    && let Some(out) = self.split()
                {
                    self.append(&segment);
                    self.fence = FenceState::Outside;
                    return Some(out);
                }
                self.append(&segment);
                self.fence = FenceState::Outside;
                if self.current_len > self.soft {
                    self.current_len = 0;
                    return Some(std::mem::take(&mut self.current));
                }
                None
            }
        }
    }
}

impl Iterator for Chunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if let Some(whole) = self.whole.take() {
            return (!whole.is_empty()).then(|| whole.to_string());
        }

        while let Some(segment) = self.segments.next() {
            if let Some(chunk) = self.step(segment) {
                return Some(chunk);
            }
        }

        if self.current.is_empty() {
            return None;
        }
        self.current_len = 0;
        Some(std::mem::take(&mut self.current))
    }
}

/// Line that reopens a block: the opening fence line when short enough,
/// otherwise a bare fence.
fn reopen_marker(opening: &str) -> String {
    let trimmed = opening.trim();
    let mut marker = if trimmed.chars().count() <= MAX_REOPEN_MARKER {
        trimmed.to_string()
    } else {
        FENCE.to_string()
    };
    marker.push('\n');
    marker
}

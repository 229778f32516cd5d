//! Length-based token estimation.

use crate::content::Contents;

/// Average number of characters per token assumed by [`estimate_tokens`].
const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of `contents`.
///
/// Concatenates every text part (non-text parts are excluded) and returns
/// `ceil(chars / 4)`. This is a heuristic, not a tokenizer. Characters are
/// counted as Unicode scalar values via `.chars()`.
pub fn estimate_tokens(contents: &Contents) -> u32 {
    let char_count = contents.text().chars().count();
    u32::try_from(char_count.div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
}

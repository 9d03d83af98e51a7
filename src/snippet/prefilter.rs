//! Pattern Prefilter: fast textual reject list ahead of the parser.
//!
//! Plain substring containment over the policy's pattern list, independent of
//! syntactic context. A banned spelling inside an identifier or a string
//! literal still rejects; that over-rejection is acceptable because this path
//! always runs before, never instead of, the structural validator.

use crate::policy::SafetyPolicy;

/// `true` when no deny-listed substring occurs anywhere in the raw text.
pub fn prefilter(snippet: &str, policy: &SafetyPolicy) -> bool {
    first_banned_pattern(snippet, policy).is_none()
}

/// First deny-listed substring present in the snippet, for diagnostics.
pub fn first_banned_pattern<'p>(snippet: &str, policy: &'p SafetyPolicy) -> Option<&'p str> {
    policy
        .denied_patterns
        .iter()
        .map(String::as_str)
        .find(|pattern| snippet.contains(pattern))
}

// ------------------------------- Tests ------------------------------------ //

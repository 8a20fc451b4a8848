//! Profile name normalization.

/// Longest fragment [`normalize`] produces.
pub const MAX_SLUG_LEN: usize = 45;

/// Turn a human-readable profile name into an identifier fragment.
///
/// Lowercases, drops everything but ASCII letters, digits, whitespace and `-`,
/// collapses whitespace runs, truncates to [`MAX_SLUG_LEN`] characters and joins
/// the remaining words with hyphens.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();

    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");

    // Only ASCII survives the filter, so byte and char lengths agree.
    let truncated = &collapsed[..collapsed.len().min(MAX_SLUG_LEN)];

    truncated.trim_end().replace(' ', "-")
}

//! Category pattern matching for playlist routing.

/// Case-insensitive match of a chapter category against a mapping pattern.
///
/// A pattern without `*` must equal the category. A pattern with exactly one
/// `*` splits into a prefix and a suffix: an empty side is unconstrained,
/// otherwise the category must start with the prefix and end with the
/// suffix. The two may overlap, so `a*b` matches `ab`.
///
/// Only a single split point is recognized. A pattern with two or more `*`
/// is compared literally, so `*valorant*` only matches the category
/// `*valorant*`.
pub fn matches(pattern: &str, category: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let category = category.to_lowercase();

    let mut parts = pattern.split('*');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(prefix), Some(suffix), None) => match (prefix.is_empty(), suffix.is_empty()) {
            (true, true) => true,
            (true, false) => category.ends_with(suffix),
            (false, true) => category.starts_with(prefix),
            (false, false) => category.starts_with(prefix) && category.ends_with(suffix),
        },
        _ => pattern == category,
    }
}

//! Collision-free naming for remote objects.
//!
//! Windows, displays and images are keyed by name on the remote side, and a
//! second object created under an existing name would silently shadow the
//! first. New names are therefore disambiguated with a numeric suffix that is
//! always greater than every suffix already in use for the same stem.

/// Splits `name` into its stem and trailing run of ASCII digits.
///
/// The stem may be empty (`"42"` splits into `("", "42")`) and the digit run
/// may be empty (`"foo"` splits into `("foo", "")`).
pub fn split_numeric_suffix(name: &str) -> (&str, &str) {
    let stem_len = name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    name.split_at(stem_len)
}

/// Returns `proposed` unchanged when it is free, otherwise `stem + (max + 1)`
/// where `max` is the greatest numeric suffix among existing names of the
/// form `stem + digits` (0 when there are none).
///
/// Pure: the caller inserts the returned name itself.
pub fn resolve_name<I, S>(proposed: &str, existing: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let (stem, _) = split_numeric_suffix(proposed);
    let mut collides = false;
    let mut max_suffix: u128 = 0;

    for name in existing {
        let name = name.as_ref();
        if name == proposed {
            collides = true;
        }
        if let Some(digits) = name.strip_prefix(stem) {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(suffix) = digits.parse::<u128>() {
                    max_suffix = max_suffix.max(suffix);
                }
            }
        }
    }

    if !collides {
        return proposed.to_string();
    }

    match max_suffix.checked_add(1) {
        Some(next) => format!("{}{}", stem, next),
        None => format!("{}{}1", stem, max_suffix),
    }
}

//! Species name normalization.

const TRAILING_SUFFIXES: [&str; 5] = ["seed", "plant", "baby", "fruit", "crop"];

/// Normalize a species or item display name into a lookup key.
///
/// Lowercases, strips apostrophes/backticks, whitespace and hyphens, then
/// drops one trailing `seed`, `plant`, `baby`, `fruit` or `crop` suffix, so
/// `"Tulip Seed"`, `"tulip"` and `"Tu-lip"` all map to `"tulip"`.
pub fn normalize_species_key(value: &str) -> String {
    let mut key: String = value
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}' | '`' | '-') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    for suffix in TRAILING_SUFFIXES {
        if key.ends_with(suffix) {
            key.truncate(key.len() - suffix.len());
            break;
        }
    }
    key
}

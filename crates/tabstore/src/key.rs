#![forbid(unsafe_code)]

//! Scoped storage key derivation.

/// Separator placed between prefix and logical key when none is configured.
pub const DEFAULT_SEPARATOR: &str = ".";

/// Derive the storage key for `key` under an optional namespace `prefix`.
///
/// With a non-empty prefix the result is `prefix + separator + key`;
/// otherwise the logical key is used unchanged. An explicit empty-string
/// prefix behaves exactly like no prefix: no separator is applied. Pure
/// and deterministic.
///
/// ```
/// use tabstore::key::scoped_key;
///
/// assert_eq!(scoped_key("k", Some("p"), "."), "p.k");
/// assert_eq!(scoped_key("k", None, "."), "k");
/// assert_eq!(scoped_key("k", Some(""), "."), "k");
/// ```
#[must_use]
pub fn scoped_key(key: &str, prefix: Option<&str>, separator: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}{separator}{key}"),
        _ => key.to_owned(),
    }
}

//! Environment variable helpers
//!
//! The shell side configures SENTINEL through `SENTINEL_*` variables; these
//! helpers read them with the conventions shell users expect.

/// Get environment variable or compute default
///
/// # Example
/// ```rust
/// use sentinel_modules::utils::env_or_else;
///
/// let home = env_or_else("HOME", || ".".to_string());
/// ```
pub fn env_or_else<F>(key: &str, f: F) -> String
where
    F: FnOnce() -> String,
{
    std::env::var(key).unwrap_or_else(|_| f())
}

/// Value of `key`, if set to valid unicode
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Shell-style flag: `1`, `true`, `yes` or `on` (any case, surrounding
/// whitespace ignored). Unset or anything else is `false`.
pub fn env_bool(key: &str) -> bool {
    std::env::var(key).is_ok_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Get environment variable as a list split on `separator`
///
/// Empty items are dropped. Returns `None` if the variable is unset or
/// holds no items.
pub fn env_list(key: &str, separator: char) -> Option<Vec<String>> {
    let items: Vec<String> = std::env::var(key)
        .ok()?
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

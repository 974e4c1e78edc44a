use std::str::FromStr;

/// Prefix checked before the bare variable name
const ENV_PREFIX: &str = "TIDEWAY_";

/// Read `TIDEWAY_{key}`, falling back to `{key}`
///
/// # Examples
///
/// ```rust,ignore
/// use crate::utils::get_env_with_prefix;
///
/// // Checks TIDEWAY_EMAIL_HOST first, then EMAIL_HOST
/// let host = get_env_with_prefix("EMAIL_HOST");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, key))
        .or_else(|_| std::env::var(key))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Read and parse a variable via [`get_env_with_prefix`]
///
/// Unparseable values are ignored so the caller's default applies.
pub fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    get_env_with_prefix(key).and_then(|value| value.trim().parse().ok())
}

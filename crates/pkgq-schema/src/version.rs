//! Version string helpers.
//!
//! Catalog versions are free-form (`2.12.1`, `v1.2`, `2023-01-01`,
//! `unstable-2024-03-05`). Semver range matching needs real semantic
//! versions, so loose versions are coerced where the shape allows it.

/// Split a derivation name into its short name and version.
///
/// The version starts at the first `-` that is followed by a character
/// that is not a letter, matching how package names are conventionally
/// built (`hello-2.12.1`, `python3.11-pip-23.0`).
///
/// # Example
///
/// ```
/// use pkgq_schema::version::parse_drv_name;
///
/// assert_eq!(parse_drv_name("hello-2.12.1"), ("hello", Some("2.12.1")));
/// assert_eq!(parse_drv_name("git-lfs"), ("git-lfs", None));
/// ```
pub fn parse_drv_name(name: &str) -> (&str, Option<&str>) {
    let bytes = name.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'-' && bytes.get(i + 1).is_some_and(|c| !c.is_ascii_alphabetic()) {
            return (&name[..i], Some(&name[i + 1..]));
        }
    }
    (name, None)
}

/// Coerce a loose version string into a semantic version.
///
/// Leading `v` / `=` are dropped, one to three numeric components are
/// padded to three, and a `-suffix` is kept as the pre-release part when it
/// is valid and does not start with a digit. Anything else, such as four
/// components, dates or words, yields `None`.
///
/// # Example
///
/// ```
/// use pkgq_schema::version::coerce_semver;
///
/// assert_eq!(coerce_semver("v1.2").unwrap().to_string(), "1.2.0");
/// assert!(coerce_semver("unstable-2024-01-01").is_none());
/// ```
pub fn coerce_semver(version: &str) -> Option<semver::Version> {
    let trimmed = version.trim().trim_start_matches(['v', '=']);
    if let Ok(v) = semver::Version::parse(trimmed) {
        return Some(v);
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let mut nums = [0u64; 3];
    for (slot, part) in nums.iter_mut().zip(&parts) {
        *slot = part.parse().ok()?;
    }

    if !(rest.is_empty() || rest.starts_with('-') || rest.starts_with('+')) {
        return None;
    }
    // `2023-01-01` is a date, not 2023.0.0 with a pre-release
    if rest
        .strip_prefix('-')
        .is_some_and(|pre| pre.starts_with(|c: char| c.is_ascii_digit()))
    {
        return None;
    }
    semver::Version::parse(&format!("{}.{}.{}{rest}", nums[0], nums[1], nums[2])).ok()
}

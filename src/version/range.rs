use std::fmt;
use std::str::FromStr;

/// A version range in either Cargo or npm notation.
///
/// `||` separates alternatives; a version matches when any alternative does.
/// Within an alternative, comparators may be separated by commas or
/// whitespace, and `A - B` is an inclusive hyphen range. A bare version is
/// exact (`1.2.0` means `=1.2.0`, `1.2` means `1.2.x`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<semver::VersionReq>,
}

impl VersionRange {
    pub fn parse(range: &str) -> Result<Self, semver::Error> {
        let raw = range.trim();
        let alternatives = raw
            .split("||")
            .map(|alternative| semver::VersionReq::parse(&normalize(alternative)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    pub fn matches(&self, version: &semver::Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    pub fn alternatives(&self) -> &[semver::VersionReq] {
        &self.alternatives
    }
}

impl FromStr for VersionRange {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Rewrites one alternative into the comma-separated form `semver` reads.
fn normalize(alternative: &str) -> String {
    let alternative = alternative.trim();
    if alternative.is_empty() {
        return "*".to_string();
    }
    if let Some((low, high)) = alternative.split_once(" - ") {
        return format!(">={}, <={}", low.trim(), high.trim());
    }

    let mut comparators = Vec::new();
    // `>= 1.0` splits into two tokens; the operator waits for its version.
    let mut operator: Option<&str> = None;
    for token in alternative
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            operator = Some(token);
            continue;
        }
        match operator.take() {
            Some(op) => comparators.push(format!("{op}{token}")),
            None if is_bare_version(token) => comparators.push(format!("={token}")),
            None => comparators.push(token.to_string()),
        }
    }
    if let Some(op) = operator {
        // Dangling operator; left in so parsing reports it.
        comparators.push(op.to_string());
    }
    comparators.join(", ")
}

fn is_bare_version(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit())
        && !token.contains(|c: char| matches!(c, 'x' | 'X' | '*'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(version: &str) -> semver::Version {
        semver::Version::parse(version).unwrap()
    }

    #[test]
    fn test_cargo_syntax_unchanged() {
        let range = VersionRange::parse(">=1, <2").unwrap();
        assert!(range.matches(&v("1.5.0")));
        assert!(!range.matches(&v("2.0.0")));
        assert!(VersionRange::parse("^1.2").unwrap().matches(&v("1.9.0")));
    }

    #[test]
    fn test_whitespace_separated_comparators() {
        let range = VersionRange::parse(">=1.0.0 <2.0.0").unwrap();
        assert!(range.matches(&v("1.2.0")));
        assert!(!range.matches(&v("2.0.0")));

        let spaced = VersionRange::parse(">= 1.4.0  < 1.6").unwrap();
        assert!(spaced.matches(&v("1.5.3")));
        assert!(!spaced.matches(&v("1.6.0")));
    }

    #[test]
    fn test_hyphen_range_is_inclusive() {
        let range = VersionRange::parse("1.0.0 - 1.2.0").unwrap();
        assert!(range.matches(&v("1.0.0")));
        assert!(range.matches(&v("1.2.0")));
        assert!(!range.matches(&v("1.2.1")));
        assert!(!range.matches(&v("0.9.9")));
    }

    #[test]
    fn test_alternatives() {
        let range = VersionRange::parse("^1.0.0 || ^3.0.0").unwrap();
        assert_eq!(range.alternatives().len(), 2);
        assert!(range.matches(&v("1.4.0")));
        assert!(range.matches(&v("3.1.0")));
        assert!(!range.matches(&v("2.0.0")));
        assert_eq!(range.to_string(), "^1.0.0 || ^3.0.0");
    }

    #[test]
    fn test_bare_versions_are_exact() {
        let range = VersionRange::parse("1.0.0 || 2.0.0").unwrap();
        assert!(range.matches(&v("1.0.0")));
        assert!(!range.matches(&v("1.2.0")));

        let minor = VersionRange::parse("1.2").unwrap();
        assert!(minor.matches(&v("1.2.7")));
        assert!(!minor.matches(&v("1.3.0")));
        assert!(VersionRange::parse("1.x").unwrap().matches(&v("1.8.0")));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(VersionRange::parse("sometime").is_err());
        assert!(VersionRange::parse(">=").is_err());
        assert!(VersionRange::parse("^1 || nope").is_err());
    }
}

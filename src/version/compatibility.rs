use crate::version::Resolution;
use crate::version::range::VersionRange;

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompatibilityReport {
    pub compatible: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Checks a set of resolved plugins against the engine versions available at
/// runtime (`requirements`: engine name → concrete version).
///
/// An engine range the requirement does not satisfy, or that cannot be parsed,
/// is an issue. Deprecated builds and engines with no supplied version are
/// warnings only.
pub fn validate_compatibility(
    resolutions: &[Resolution],
    requirements: &BTreeMap<String, String>,
) -> CompatibilityReport {
    let mut report = CompatibilityReport::default();

    for resolution in resolutions {
        let id = format!("{}@{}", resolution.name, resolution.version);

        if resolution.deprecated {
            report.warnings.push(match &resolution.deprecation_message {
                Some(message) => format!("{id} is deprecated: {message}"),
                None => format!("{id} is deprecated"),
            });
        }

        for (engine, range) in &resolution.engines {
            let Some(provided) = requirements.get(engine) else {
                report
                    .warnings
                    .push(format!("{id} declares {engine} {range}, but no {engine} version was supplied"));
                continue;
            };

            let range_req = match VersionRange::parse(range) {
                Ok(req) => req,
                Err(e) => {
                    report
                        .issues
                        .push(format!("{id} declares an invalid {engine} range '{range}': {e}"));
                    continue;
                }
            };
            match semver::Version::parse(provided) {
                Ok(version) if range_req.matches(&version) => {}
                Ok(_) => report.issues.push(format!(
                    "{id} requires {engine} {range}, but {provided} is provided"
                )),
                Err(e) => report
                    .issues
                    .push(format!("Supplied {engine} version '{provided}' is invalid: {e}")),
            }
        }
    }

    report.compatible = report.issues.is_empty();
    if !report.compatible {
        log::warn!(
            "{} compatibility issue(s) across {} plugin(s)",
            report.issues.len(),
            resolutions.len()
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::ResolutionStrategy;

    fn resolution(name: &str, version: &str, engines: &[(&str, &str)]) -> Resolution {
        Resolution {
            name: name.to_string(),
            version: semver::Version::parse(version).unwrap(),
            strategy: ResolutionStrategy::Exact,
            download_url: None,
            integrity: None,
            size: None,
            deprecated: false,
            deprecation_message: None,
            engines: engines
                .iter()
                .map(|(e, r)| (e.to_string(), r.to_string()))
                .collect(),
            warnings: Vec::new(),
        }
    }

    fn runtime(version: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("runtime".to_string(), version.to_string())])
    }

    #[test]
    fn test_all_satisfied() {
        let report = validate_compatibility(
            &[
                resolution("pdf-loader", "1.0.0", &[("runtime", ">=1.4.0")]),
                resolution("bm25", "2.0.0", &[("runtime", "^1")]),
            ],
            &runtime("1.6.2"),
        );
        assert!(report.compatible);
        assert!(report.issues.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_unsatisfied_range_is_an_issue() {
        let report = validate_compatibility(
            &[resolution("bm25", "2.0.0", &[("runtime", ">=2.0.0")])],
            &runtime("1.6.2"),
        );
        assert!(!report.compatible);
        assert_eq!(
            report.issues,
            vec!["bm25@2.0.0 requires runtime >=2.0.0, but 1.6.2 is provided"]
        );
    }

    #[test]
    fn test_npm_engine_ranges() {
        let engines = [("runtime", ">=1.4.0 <2.0.0 || 3.0.0 - 3.2.0")];
        assert!(validate_compatibility(&[resolution("bm25", "1.0.0", &engines)], &runtime("1.6.2")).compatible);
        assert!(validate_compatibility(&[resolution("bm25", "1.0.0", &engines)], &runtime("3.2.0")).compatible);

        let report = validate_compatibility(&[resolution("bm25", "1.0.0", &engines)], &runtime("2.5.0"));
        assert_eq!(
            report.issues,
            vec!["bm25@1.0.0 requires runtime >=1.4.0 <2.0.0 || 3.0.0 - 3.2.0, but 2.5.0 is provided"]
        );
    }

    #[test]
    fn test_deprecated_is_a_warning() {
        let mut old = resolution("bm25", "1.0.0", &[]);
        old.deprecated = true;
        old.deprecation_message = Some("use 2.x".to_string());

        let report = validate_compatibility(&[old], &BTreeMap::new());
        assert!(report.compatible);
        assert_eq!(report.warnings, vec!["bm25@1.0.0 is deprecated: use 2.x"]);
    }

    #[test]
    fn test_missing_and_invalid_inputs() {
        let report = validate_compatibility(
            &[
                resolution("a", "1.0.0", &[("gpu", ">=12")]),
                resolution("b", "1.0.0", &[("runtime", "sometime")]),
            ],
            &runtime("1.0.0"),
        );
        assert!(!report.compatible);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.warnings.len(), 1);

        let report = validate_compatibility(
            &[resolution("a", "1.0.0", &[("runtime", "^1")])],
            &runtime("one"),
        );
        assert!(!report.compatible);
    }
}

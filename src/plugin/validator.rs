use crate::core::validation::ValidationReport;
use crate::plugin::component::{Member, Plugin};
use crate::plugin::contract::{Contract, TypeTag};
use crate::plugin::metadata::validate_metadata;

/// Checks a candidate plugin against a category contract.
///
/// All checks run and report into one [`ValidationReport`]:
/// 1. metadata is present, with a non-empty name and version, and a `type`
///    equal to the contract's category;
/// 2. every required member exists, and is invocable when the contract
///    declares it as a function (or has the declared data type otherwise);
/// 3. metadata shape (name pattern, semantic version, engine ranges).
///
/// Members the contract does not mention are reported as warnings.
pub fn validate(contract: &Contract, candidate: &Plugin) -> ValidationReport {
    let mut report = ValidationReport::new();
    let expected = contract.category();

    match candidate.metadata() {
        None => report.add_error("/metadata", "Plugin metadata is required"),
        Some(metadata) => {
            if metadata.name.trim().is_empty() {
                report.add_error(
                    "/metadata/name",
                    "Plugin metadata.name must be a non-empty string",
                );
            }
            if metadata.version.trim().is_empty() {
                report.add_error("/metadata/version", "Plugin metadata.version is required");
            }
            if metadata.category != expected.as_str() {
                report.add_error(
                    "/metadata/type",
                    format!(
                        "Plugin type mismatch: expected '{}', got '{}'",
                        expected, metadata.category
                    ),
                );
            }
        }
    }

    for required in contract.required_members() {
        let path = format!("/{}", required.name);
        match (required.kind, candidate.member(&required.name)) {
            (TypeTag::Function, None) => report.add_error(
                path,
                format!("Plugin missing required method: {}", required.name),
            ),
            (TypeTag::Function, Some(Member::Value(_))) => report.add_error(
                path,
                format!("Plugin member '{}' must be a function", required.name),
            ),
            (TypeTag::Function, Some(Member::Capability(_))) => {}
            (kind, None) => report.add_error(
                path,
                format!(
                    "Plugin missing required property: {} ({})",
                    required.name,
                    kind.as_str()
                ),
            ),
            (kind, Some(Member::Value(value))) if !kind.accepts(value) => report.add_error(
                path,
                format!(
                    "Plugin property '{}' must be of type {}",
                    required.name,
                    kind.as_str()
                ),
            ),
            (kind, Some(Member::Capability(_))) => report.add_error(
                path,
                format!(
                    "Plugin property '{}' must be of type {}, found a function",
                    required.name,
                    kind.as_str()
                ),
            ),
            (_, Some(Member::Value(_))) => {}
        }
    }

    if let Some(metadata) = candidate.metadata() {
        report.merge(validate_metadata(metadata));
    }

    for name in candidate.member_names() {
        if !contract.declares(name) {
            report.add_warning(
                format!("/{name}"),
                format!("Member '{name}' is not declared by the {expected} contract"),
            );
        }
    }

    report
}

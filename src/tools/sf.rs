//! Salesforce CLI: incremental delta generation and validate-only deployment.

use std::path::{Path, PathBuf};

use super::ToolInvocation;

/// Builds `sf sgd source delta`, writing the incremental package to `output_dir`.
pub fn delta_invocation(
    sf: &str,
    from: &str,
    output_dir: &Path,
    source_dir: Option<&str>,
) -> ToolInvocation {
    let invocation = ToolInvocation::from_command(sf).args([
        "sgd".to_string(),
        "source".to_string(),
        "delta".to_string(),
        "--from".to_string(),
        from.to_string(),
        "--to".to_string(),
        "HEAD".to_string(),
        "--output-dir".to_string(),
        output_dir.display().to_string(),
    ]);

    match source_dir {
        Some(dir) => invocation.arg("--source-dir").arg(dir),
        None => invocation,
    }
}

/// Location of the manifest the delta generator writes.
pub fn delta_manifest(output_dir: &Path) -> PathBuf {
    output_dir.join("package").join("package.xml")
}

/// Builds `sf project deploy validate` for `manifest` against `alias`.
///
/// A non-empty `tests` list switches the run to `RunSpecifiedTests`.
pub fn validate_invocation(
    sf: &str,
    manifest: &Path,
    alias: &str,
    wait_minutes: u32,
    tests: &[String],
) -> ToolInvocation {
    let mut invocation = ToolInvocation::from_command(sf).args([
        "project".to_string(),
        "deploy".to_string(),
        "validate".to_string(),
        "--manifest".to_string(),
        manifest.display().to_string(),
        "--target-org".to_string(),
        alias.to_string(),
        "--wait".to_string(),
        wait_minutes.to_string(),
    ]);

    if !tests.is_empty() {
        invocation = invocation.arg("--test-level").arg("RunSpecifiedTests");
        for test in tests {
            invocation = invocation.arg("--tests").arg(test.as_str());
        }
    }

    invocation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_command_line() {
        let invocation = delta_invocation("sf", "abc123", Path::new("/tmp/run/delta"), None);
        assert_eq!(
            invocation.display(),
            "sf sgd source delta --from abc123 --to HEAD --output-dir /tmp/run/delta"
        );
    }

    #[test]
    fn delta_with_source_dir() {
        let invocation =
            delta_invocation("sf", "abc123", Path::new("out"), Some("force-app"));
        assert!(invocation.display().ends_with("--source-dir force-app"));
    }

    #[test]
    fn manifest_location() {
        assert_eq!(
            delta_manifest(Path::new("/tmp/run/delta")),
            Path::new("/tmp/run/delta/package/package.xml")
        );
    }

    #[test]
    fn validate_without_tests_uses_org_default() {
        let invocation =
            validate_invocation("sf", Path::new("package.xml"), "ci-org", 33, &[]);
        assert_eq!(
            invocation.display(),
            "sf project deploy validate --manifest package.xml --target-org ci-org --wait 33"
        );
    }

    #[test]
    fn validate_with_specified_tests() {
        let tests = vec!["AccountTest".to_string(), "ContactTest".to_string()];
        let invocation =
            validate_invocation("sf", Path::new("package.xml"), "ci-org", 10, &tests);
        assert!(invocation.display().ends_with(
            "--test-level RunSpecifiedTests --tests AccountTest --tests ContactTest"
        ));
    }
}

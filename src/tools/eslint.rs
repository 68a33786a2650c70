//! ESLint for JavaScript files.

use super::ToolInvocation;

/// Builds an ESLint run over `files`, which are passed as arguments.
pub fn lint_invocation(eslint: &str, files: &[String]) -> ToolInvocation {
    ToolInvocation::from_command(eslint).args(files.iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_are_arguments_in_order() {
        let files = vec![
            "force-app/lwc/b/b.js".to_string(),
            "force-app/lwc/a/a.js".to_string(),
        ];
        let invocation = lint_invocation("npx eslint", &files);
        assert_eq!(invocation.program, "npx");
        assert_eq!(
            invocation.args,
            ["eslint", "force-app/lwc/b/b.js", "force-app/lwc/a/a.js"]
        );
    }
}

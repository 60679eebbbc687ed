//! Interactive vs. CI detection

use std::io::IsTerminal;

/// CI systems that set their own marker variable
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// Decides whether output may use colors and spinners
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Interactive only on a terminal outside CI
    pub fn detect() -> Self {
        let on_ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            interactive: std::io::stdout().is_terminal() && !on_ci,
        }
    }

    /// Plain output, for tests and piped runs
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}

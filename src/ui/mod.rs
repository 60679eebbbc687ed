//! Terminal output for the CLI
//!
//! Styled output and spinners when attached to a terminal, plain
//! `[OK]`/`[WARN]` lines when piped or running under CI.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, section, step_info, step_ok, step_ok_detail, step_warn, step_warn_hint};
pub use progress::TaskSpinner;

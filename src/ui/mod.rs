//! Terminal output for bwcache
//!
//! Uses `cliclack` for styled output on interactive terminals and falls back
//! to plain `[OK]`/`[WARN]` lines in CI. Lookup results never go through this
//! module: they are printed raw so they can be captured by scripts.

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{intro, key_value, remark, step_error_detail, step_info, step_ok, step_warn_hint};
pub use progress::TaskSpinner;
pub use prompts::confirm;
pub use theme::{init_theme, BwcacheTheme};

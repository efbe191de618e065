//! # gemini-progress
//!
//! **Tier 5 (Progress UI)**
//!
//! A thin wrapper around `indicatif` for the CLI's build/report progress
//! indicators (SPEC_FULL §4.Progress). `enabled` is false whenever
//! `--output json` is selected or a test constructs one directly, giving
//! a true no-op with zero terminal writes — the same `ui` cargo-feature
//! gating the rest of the workspace uses to keep `indicatif` optional.
//!
//! ## What belongs here
//! * `Progress` — an indeterminate spinner with a settable message
//!
//! ## What does NOT belong here
//! * Deciding whether a run is interactive (`gemini-cli`)

#[cfg(feature = "ui")]
use std::time::Duration;

/// An indeterminate spinner. `enabled=false` makes every method a no-op,
/// so callers don't need to branch on whether a run is interactive.
pub struct Progress {
    #[cfg(feature = "ui")]
    bar: Option<indicatif::ProgressBar>,
}

impl Progress {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        #[cfg(feature = "ui")]
        {
            let bar = enabled.then(|| {
                let bar = indicatif::ProgressBar::new_spinner();
                bar.enable_steady_tick(Duration::from_millis(120));
                bar
            });
            Self { bar }
        }
        #[cfg(not(feature = "ui"))]
        {
            let _ = enabled;
            Self {}
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        #[cfg(feature = "ui")]
        if let Some(bar) = &self.bar {
            bar.set_message(message.into());
        }
        #[cfg(not(feature = "ui"))]
        {
            let _ = message.into();
        }
    }

    pub fn finish_and_clear(&self) {
        #[cfg(feature = "ui")]
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

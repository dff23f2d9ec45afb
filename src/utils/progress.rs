//! Page-fetch spinner built on indicatif.

use indicatif::{ProgressBar as IndicatifBar, ProgressDrawTarget, ProgressStyle};

/// Spinner that counts fetched pages and accumulated events
pub struct PageProgress {
    bar: IndicatifBar,
}

impl PageProgress {
    pub fn new(label: &str) -> Self {
        let bar = IndicatifBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{msg} {spinner} page {pos}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(label.to_string());

        Self { bar }
    }

    /// A spinner that draws nothing, for tests and `--quiet` style runs
    pub fn hidden() -> Self {
        let bar = IndicatifBar::with_draw_target(None, ProgressDrawTarget::hidden());
        Self { bar }
    }

    /// Record one more page holding `events` records
    pub fn page_done(&self, events: usize) {
        self.bar.inc(1);
        self.bar.set_message(format!(
            "Fetching authentication logs ({} events)",
            crate::utils::format::format_number(events)
        ));
    }

    pub fn pages(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

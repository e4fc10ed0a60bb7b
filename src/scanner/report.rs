use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use super::outcome::ProbeOutcome;

const BAR_TEMPLATE: &str = "{spinner} [{elapsed_precise}] [{wide_bar}] {pos}/{len} ({per_sec})";

/// Progress bar and the optional per-probe advisory line.
///
/// Reporting only ever prints, it never fails a probe.
#[derive(Debug, Clone)]
pub struct Reporter {
    bar: ProgressBar,
    verbose: bool,
    accessible: bool,
}

impl Reporter {
    /// A bar of length `total`, hidden in accessible mode. With `verbose`,
    /// one line is printed per outcome.
    pub fn new(total: u64, verbose: bool, accessible: bool) -> Self {
        let bar = if accessible {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        };

        Self {
            bar,
            verbose,
            accessible,
        }
    }

    /// No bar and no advisory lines.
    pub fn silent() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            verbose: false,
            accessible: true,
        }
    }

    /// Advances the bar and prints the advisory line if verbose.
    pub fn probed(&self, outcome: &ProbeOutcome) {
        if self.verbose {
            self.println(&self.advisory(outcome));
        }
        self.bar.inc(1);
    }

    /// Clears the bar.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// `address status` on success, `address error` otherwise.
    fn advisory(&self, outcome: &ProbeOutcome) -> String {
        let detail = match (&outcome.error, outcome.status) {
            (Some(error), _) if self.accessible => error.clone(),
            (Some(error), _) => error.red().to_string(),
            (None, Some(status)) if self.accessible => status.to_string(),
            (None, Some(status)) => status.to_string().green().to_string(),
            (None, None) => String::new(),
        };
        format!("{} {}", outcome.address, detail)
    }

    fn println(&self, line: &str) {
        if self.bar.is_hidden() {
            println!("{line}");
        } else {
            self.bar.println(line);
        }
    }
}

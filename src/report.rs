//! Per-run bookkeeping of processed and skipped items.
//!
//! A single unusable arrival time distribution or a file without calibration
//! data never stops a run; it becomes a [`SkippedItem`] and processing moves
//! on. The [`RunReport`] collects them for printing at the end.

use std::fmt;

#[cfg(feature = "colorized_output")]
use console::style;
use serde::Serialize;

use crate::calibration::DriftGas;

/// Why an item was left out of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Gaussian fitting did not produce a usable result
    FitFailed(String),
    /// Analyte/charge pair missing from the CCS reference
    NotInReference,
    /// Reference has the analyte but no value for this drift gas
    NoGasValue(DriftGas),
    /// No calibration entries match the analyte and charge
    NoCalibration,
    /// Every calibration entry was discarded by the CCS spread filter
    AllEntriesFiltered,
    /// Input could not be read or parsed
    Unreadable(String),
    /// Sample could not be converted (e.g. drift time before t0)
    OutOfRange(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FitFailed(msg) => write!(f, "Gaussian fit failed ({msg})"),
            SkipReason::NotInReference => write!(f, "not found in reference database"),
            SkipReason::NoGasValue(gas) => write!(f, "no {gas} CCS value available"),
            SkipReason::NoCalibration => write!(f, "no matching calibration data"),
            SkipReason::AllEntriesFiltered => {
                write!(f, "all calibration entries exceed the CCS spread threshold")
            }
            SkipReason::Unreadable(msg) => write!(f, "unreadable input ({msg})"),
            SkipReason::OutOfRange(msg) => write!(f, "out of range ({msg})"),
        }
    }
}

/// One item left out of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedItem {
    /// Human-readable identifier, e.g. `myoglobin_8` or a file path
    pub label: String,
    /// Why it was skipped
    pub reason: SkipReason,
}

impl SkippedItem {
    /// Create a skipped item
    pub fn new(label: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            label: label.into(),
            reason,
        }
    }
}

impl fmt::Display for SkippedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.reason)
    }
}

/// Summary of a command run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Report heading
    pub title: String,
    /// Number of items that were processed successfully
    pub processed: usize,
    /// Extra `name: value` lines shown in the summary
    pub details: Vec<(String, String)>,
    /// Items that were left out
    pub skipped: Vec<SkippedItem>,
}

impl RunReport {
    /// Empty report with a heading
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Add a `name: value` summary line
    pub fn detail(&mut self, name: impl Into<String>, value: impl fmt::Display) {
        self.details.push((name.into(), value.to_string()));
    }

    /// Record skipped items
    pub fn extend_skipped(&mut self, items: impl IntoIterator<Item = SkippedItem>) {
        self.skipped.extend(items);
    }

    /// True when anything was skipped
    pub fn has_skipped(&self) -> bool {
        !self.skipped.is_empty()
    }

    /// Format the report with colors (requires console feature)
    pub fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            use console::Emoji;

            static OK: Emoji<'_, '_> = Emoji("✓", "[OK]");
            static SKIP: Emoji<'_, '_> = Emoji("⚠", "[SKIP]");

            let mut output = String::new();
            output.push_str(&format!("{}\n", style(&self.title).bold().cyan()));
            output.push_str(&format!(
                "{}\n",
                style("=".repeat(self.title.chars().count())).cyan()
            ));
            for (name, value) in &self.details {
                output.push_str(&format!("{}: {}\n", style(name).bold(), value));
            }
            output.push('\n');
            output.push_str(&format!(
                "[{}] {} processed\n",
                OK,
                style(self.processed).green()
            ));
            for item in &self.skipped {
                output.push_str(&format!(
                    "[{}] {} - {}\n",
                    SKIP,
                    style(&item.label).yellow(),
                    item.reason
                ));
            }
            output.push_str(&format!(
                "\n{}: {} processed, {} skipped\n",
                style("Summary").bold(),
                style(self.processed).green(),
                style(self.skipped.len()).yellow()
            ));
            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            format!("{}", self)
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "=".repeat(self.title.chars().count()))?;
        for (name, value) in &self.details {
            writeln!(f, "{}: {}", name, value)?;
        }
        writeln!(f)?;
        writeln!(f, "[✓] {} processed", self.processed)?;
        for item in &self.skipped {
            writeln!(f, "[⚠] {} - {}", item.label, item.reason)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Summary: {} processed, {} skipped",
            self.processed,
            self.skipped.len()
        )
    }
}

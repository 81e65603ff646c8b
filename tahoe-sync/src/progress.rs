use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const BYTES_TEMPLATE: &str =
    "{msg} [{bar:30.cyan/blue}] {binary_bytes}/{binary_total_bytes} ({binary_bytes_per_sec}, {eta})";
const BITS_TEMPLATE: &str = "{msg} [{bar:30.cyan/blue}] {human_pos}/{human_len} bits ({eta})";

/// Unit in which upload progress is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressUnit {
    #[default]
    Bytes,
    Bits,
}

impl ProgressUnit {
    pub fn multiplier(self) -> u64 {
        match self {
            ProgressUnit::Bytes => 1,
            ProgressUnit::Bits => 8,
        }
    }
}

impl FromStr for ProgressUnit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bytes" => Ok(ProgressUnit::Bytes),
            "bits" => Ok(ProgressUnit::Bits),
            other => Err(format!("unknown progress unit: {other} (expected bytes or bits)")),
        }
    }
}

impl fmt::Display for ProgressUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProgressUnit::Bytes => "bytes",
            ProgressUnit::Bits => "bits",
        })
    }
}

/// Receives progress increments for a single upload.
pub trait ProgressSink: Send + Sync {
    fn advance(&self, amount: u64);

    fn finish(&self) {}
}

/// Destination for decision lines and per-upload progress.
pub trait Reporter: Send + Sync {
    fn line(&self, line: &str);

    /// `total` is already expressed in `unit`.
    fn upload(&self, label: &str, total: u64, unit: ProgressUnit) -> Arc<dyn ProgressSink>;
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&self, _amount: u64) {}
}

/// Prints decision lines to stdout and draws nothing.
pub struct PlainReporter;

impl Reporter for PlainReporter {
    fn line(&self, line: &str) {
        println!("{line}");
    }

    fn upload(&self, _label: &str, _total: u64, _unit: ProgressUnit) -> Arc<dyn ProgressSink> {
        Arc::new(NoProgress)
    }
}

/// Draws one progress bar per upload, keeping decision lines above the bars.
pub struct TerminalReporter {
    bars: MultiProgress,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
            bars: MultiProgress::new(),
        }
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for TerminalReporter {
    fn line(&self, line: &str) {
        self.bars.suspend(|| println!("{line}"));
    }

    fn upload(&self, label: &str, total: u64, unit: ProgressUnit) -> Arc<dyn ProgressSink> {
        let template = match unit {
            ProgressUnit::Bytes => BYTES_TEMPLATE,
            ProgressUnit::Bits => BITS_TEMPLATE,
        };
        let bar = self.bars.add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::with_template(template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message(label.to_string());
        Arc::new(UploadBar {
            bar,
            bars: self.bars.clone(),
        })
    }
}

/// A bar that leaves the screen once its upload ends.
struct UploadBar {
    bar: ProgressBar,
    bars: MultiProgress,
}

impl ProgressSink for UploadBar {
    fn advance(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        self.bars.remove(&self.bar);
    }
}

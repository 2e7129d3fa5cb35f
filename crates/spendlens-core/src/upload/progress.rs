/// Converts byte counts into a non-decreasing percentage stream.
///
/// Only changes are reported: `update` returns `Some(percent)` when the
/// rounded percentage rises above the last reported value.
#[derive(Debug, Default, Clone)]
pub struct ProgressTracker {
    last: Option<u8>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `round(sent / total * 100)`, clamped to `0..=100`. `None` when the total
    /// is unknown (zero).
    pub fn percent(sent: u64, total: u64) -> Option<u8> {
        if total == 0 {
            return None;
        }
        let ratio = sent as f64 / total as f64;
        Some((ratio * 100.0).round().clamp(0.0, 100.0) as u8)
    }

    /// Reports the initial 0%.
    pub fn start(&mut self) -> Option<u8> {
        self.report(0)
    }

    /// Feeds a `(sent, total)` observation.
    pub fn update(&mut self, sent: u64, total: u64) -> Option<u8> {
        Self::percent(sent, total).and_then(|p| self.report(p))
    }

    /// Reports 100% unless it was already reported.
    pub fn finish(&mut self) -> Option<u8> {
        self.report(100)
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }

    fn report(&mut self, percent: u8) -> Option<u8> {
        match self.last {
            Some(last) if percent <= last => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }
}

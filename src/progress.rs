//! Progress estimation against the previous run's timeline.
//!
//! The estimator never guesses: a line it cannot place on the recorded
//! timeline (new content, or more repetitions than last time) leaves
//! the position where it is. The bar therefore freezes on divergence
//! instead of erroring or walking backwards.

use std::io::{self, Write};
use std::time::Duration;

use crate::state::RunState;

const BAR_WIDTH: usize = 30;

/// Tracks where the current run sits on the previous run's timeline
/// and keeps a single status line on the terminal up to date.
pub struct Estimator<W: Write> {
    previous: RunState,
    position: Duration,
    out: W,
    last_drawn: String,
}

impl Estimator<io::Stderr> {
    /// Estimator drawing to stderr, keeping stdout clean for pipes.
    pub fn new(previous: RunState) -> Self {
        Self::with_output(previous, io::stderr())
    }
}

impl<W: Write> Estimator<W> {
    pub fn with_output(previous: RunState, out: W) -> Self {
        Self {
            previous,
            position: Duration::ZERO,
            out,
            last_drawn: String::new(),
        }
    }

    /// Where the run currently sits on the historical timeline.
    pub fn position(&self) -> Duration {
        self.position
    }

    /// The 100% reference: the previous run's total duration.
    pub fn total(&self) -> Duration {
        self.previous.duration
    }

    /// Feed one line observation.
    ///
    /// Content the previous run never produced, or produced fewer times
    /// than the current run has now, is drift: the position holds. A
    /// match that would move the bar backwards is clamped for the same
    /// reason.
    pub fn observe(&mut self, key: &str, index: usize) {
        let Some(deltas) = self.previous.lines.get(key) else {
            return;
        };
        let Some(&delta) = deltas.get(index) else {
            return;
        };
        if delta > self.position {
            self.position = delta;
            self.draw();
        }
    }

    /// Final update once the child's exit status is known.
    ///
    /// A successful exit lands the bar on 100%; anything else stays
    /// where the last matched line left it.
    pub fn finish(&mut self, success: bool) {
        if success {
            self.position = self.previous.duration;
        }
        self.draw();
        let _ = writeln!(self.out);
    }

    fn draw(&mut self) {
        let line = render(self.position, self.previous.duration);
        if line == self.last_drawn {
            return;
        }
        let _ = write!(self.out, "\r{line}");
        let _ = self.out.flush();
        self.last_drawn = line;
    }
}

fn render(position: Duration, total: Duration) -> String {
    let ratio = if total.is_zero() {
        1.0
    } else {
        (position.as_secs_f64() / total.as_secs_f64()).min(1.0)
    };
    let filled = (ratio * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);

    format!(
        "[{}{}] {} / {} {:>3.0}%",
        "=".repeat(filled),
        " ".repeat(BAR_WIDTH - filled),
        format_duration(position),
        format_duration(total),
        ratio * 100.0,
    )
}

/// Whole-second rendering: `42s`, `3m05s`, `1h02m03s`.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h{minutes:02}m{seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn previous() -> RunState {
        let mut lines = HashMap::new();
        lines.insert("build".to_string(), vec![secs(0), secs(5)]);
        lines.insert("test".to_string(), vec![secs(2)]);
        RunState {
            lines,
            duration: secs(5),
        }
    }

    fn estimator() -> Estimator<Vec<u8>> {
        Estimator::with_output(previous(), Vec::new())
    }

    #[test]
    fn matched_line_moves_to_its_historical_time() {
        let mut est = estimator();
        est.observe("test", 0);
        assert_eq!(est.position(), secs(2));
    }

    #[test]
    fn unknown_content_holds_the_position() {
        let mut est = estimator();
        est.observe("test", 0);
        est.observe("something new", 0);
        assert_eq!(est.position(), secs(2));
    }

    #[test]
    fn extra_repetitions_hold_the_position() {
        let mut est = estimator();
        est.observe("test", 0);
        // "test" only occurred once historically; a second occurrence
        // has no timeline entry.
        est.observe("test", 1);
        assert_eq!(est.position(), secs(2));
    }

    #[test]
    fn repeated_content_matches_by_occurrence_index() {
        let mut est = estimator();
        est.observe("build", 0);
        assert_eq!(est.position(), secs(0));
        est.observe("build", 1);
        assert_eq!(est.position(), secs(5));
    }

    #[test]
    fn position_never_regresses() {
        let mut est = estimator();
        est.observe("build", 1);
        assert_eq!(est.position(), secs(5));
        est.observe("test", 0);
        assert_eq!(est.position(), secs(5));
    }

    #[test]
    fn success_snaps_to_the_historical_duration() {
        let mut est = estimator();
        est.observe("test", 0);
        est.finish(true);
        assert_eq!(est.position(), secs(5));
    }

    #[test]
    fn failure_keeps_the_last_matched_position() {
        let mut est = estimator();
        est.observe("test", 0);
        est.finish(false);
        assert_eq!(est.position(), secs(2));
    }

    #[test]
    fn finish_terminates_the_status_line() {
        let mut est = estimator();
        est.observe("test", 0);
        est.finish(true);

        let drawn = String::from_utf8(est.out).unwrap();
        assert!(drawn.starts_with('\r'));
        assert!(drawn.ends_with('\n'));
        assert!(drawn.contains("100%"));
    }

    #[test]
    fn draw_skips_identical_frames() {
        let mut est = estimator();
        est.observe("test", 0);
        let after_first = est.out.len();
        est.observe("unknown", 0);
        assert_eq!(est.out.len(), after_first);
    }

    #[test]
    fn zero_length_history_renders_without_dividing_by_zero() {
        let mut est = Estimator::with_output(RunState::default(), Vec::new());
        est.finish(true);
        let drawn = String::from_utf8(est.out).unwrap();
        assert!(drawn.contains("100%"));
    }

    #[test]
    fn render_shows_progress_fraction() {
        let line = render(secs(2), secs(5));
        assert!(line.contains("2s / 5s"));
        assert!(line.contains("40%"));
    }

    #[test]
    fn format_duration_picks_the_right_unit() {
        assert_eq!(format_duration(secs(42)), "42s");
        assert_eq!(format_duration(secs(185)), "3m05s");
        assert_eq!(format_duration(secs(3723)), "1h02m03s");
    }
}

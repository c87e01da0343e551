//! Console progress bar.
//!
//! Ports `prog.c`'s fixed 15-cell bar. No external progress-bar crate is
//! used here: the format is simple and fully specified, and redrawing only
//! on a visible change is the point — a generic bar crate would fight that
//! contract rather than serve it.

use std::io::Write;

const CELLS: usize = 15;

/// Tracks `done`/`total` and redraws only when the rendered bar actually
/// changes, to avoid flooding a non-interactive log with identical lines.
pub struct ProgressBar {
    total: u64,
    done: u64,
    last_filled: Option<usize>,
}

impl ProgressBar {
    pub fn new(total: u64) -> Self {
        ProgressBar {
            total,
            done: 0,
            last_filled: None,
        }
    }

    /// Advances the counter by one and redraws to stderr if the bar's filled
    /// cell count changed.
    pub fn tick(&mut self) {
        self.done = (self.done + 1).min(self.total);
        let filled = self.filled_cells();
        if self.last_filled != Some(filled) {
            self.last_filled = Some(filled);
            self.draw();
        }
    }

    fn filled_cells(&self) -> usize {
        if self.total == 0 {
            return CELLS;
        }
        ((self.done as u128 * CELLS as u128) / self.total as u128) as usize
    }

    fn draw(&self) {
        let filled = self.filled_cells();
        let mut bar = String::with_capacity(CELLS + 2);
        bar.push('[');
        for i in 0..CELLS {
            bar.push(if i < filled { '#' } else { ' ' });
        }
        bar.push(']');
        let remaining = self.total.saturating_sub(self.done);
        eprint!("\r{bar} {remaining}  ");
        let _ = std::io::stderr().flush();
    }

    /// Prints a trailing newline once progress is complete, so subsequent
    /// log output doesn't clobber the bar's line.
    pub fn finish(&self) {
        eprintln!();
    }
}

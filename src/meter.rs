//! Terminal rendering of a spectrum snapshot: vertical bars, peak caps and
//! the frequency axis.

use std::io::{self, Write};

/// Glyphs used for one character cell
const BAR_CELL: char = '█';
const PEAK_CELL: char = '▔';
const EMPTY_CELL: char = ' ';

/// Layout of the text meter
#[derive(Debug, Clone, Copy)]
pub struct MeterStyle {
    /// Rows of bar height
    pub height: usize,
    /// Characters per bar (plus one gap column)
    pub bar_width: usize,
    pub show_peaks: bool,
}

impl Default for MeterStyle {
    fn default() -> Self {
        Self {
            height: 12,
            bar_width: 1,
            show_peaks: true,
        }
    }
}

impl MeterStyle {
    pub fn total_width(&self, bars: usize) -> usize {
        bars * (self.bar_width + 1)
    }

    /// Write one full frame (clear, bars, axis) and flush
    pub fn draw_frame(
        &self,
        out: &mut impl Write,
        bands: &[f32],
        peaks: &[f32],
        ticks: &[(f32, &str)],
    ) -> io::Result<()> {
        // Cursor home, then overdraw the previous frame
        write!(out, "\x1b[H\x1b[2J")?;
        for row in self.render_bars(bands, peaks) {
            writeln!(out, "{row}")?;
        }
        writeln!(out, "{}", self.render_axis(bands.len(), ticks))?;
        out.flush()
    }

    /// Render bars and peaks (values in [0, 1]) top row first
    pub fn render_bars(&self, bands: &[f32], peaks: &[f32]) -> Vec<String> {
        let height = self.height.max(1);
        let mut rows = Vec::with_capacity(height);

        for row in (0..height).rev() {
            let mut line = String::with_capacity(self.total_width(bands.len()) * 3);
            for (i, &value) in bands.iter().enumerate() {
                let lit = level_to_rows(value, height);
                let peak_row = peaks
                    .get(i)
                    .filter(|_| self.show_peaks)
                    .map(|&p| level_to_rows(p, height));

                let cell = if row < lit {
                    BAR_CELL
                } else if peak_row.is_some_and(|p| p > 0 && p - 1 == row) {
                    PEAK_CELL
                } else {
                    EMPTY_CELL
                };
                for _ in 0..self.bar_width {
                    line.push(cell);
                }
                line.push(EMPTY_CELL);
            }
            rows.push(line);
        }
        rows
    }

    /// Axis line with labels placed at their 0..1 positions
    pub fn render_axis(&self, bars: usize, ticks: &[(f32, &str)]) -> String {
        let width = self.total_width(bars).max(1);
        let mut line = vec![' '; width];

        for &(position, label) in ticks {
            let len = label.chars().count();
            if len > width {
                continue;
            }
            let center = (position.clamp(0.0, 1.0) * (width - 1) as f32).round() as usize;
            let start = center.saturating_sub(len / 2).min(width - len);
            // Skip labels that would overwrite a neighbour
            if line[start..start + len].iter().any(|&c| c != ' ') {
                continue;
            }
            for (slot, ch) in line[start..start + len].iter_mut().zip(label.chars()) {
                *slot = ch;
            }
        }
        line.into_iter().collect::<String>().trim_end().to_string()
    }
}

/// Number of lit rows for a level in [0, 1]
fn level_to_rows(value: f32, height: usize) -> usize {
    (value.clamp(0.0, 1.0) * height as f32).round() as usize
}

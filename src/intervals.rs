//! Interval matrices
//!
//! A 12x12 view of every interval available in a tuning: row `r` is the
//! pitch class used as the lower note, column `j` the number of semitone
//! steps above it. Rows are indexed by absolute pitch class (0 = A), so
//! the base note's row holds the tonic-relative intervals.

use crate::error::{SynthError, SynthResult};
use crate::ratio::Ratio;
use crate::tuning::{interval_ratios, FrequencyTable, TuningSystem, NOTES_PER_OCTAVE};
use serde::Serialize;

/// Interval sizes in cents, each in [0, 1200)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentsMatrix {
    pub base_note: usize,
    pub cells: [[f64; NOTES_PER_OCTAVE]; NOTES_PER_OCTAVE],
}

/// Intervals as exact ratios, each in [1, 2)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioMatrix {
    pub system: TuningSystem,
    pub base_note: usize,
    pub cells: [[Ratio; NOTES_PER_OCTAVE]; NOTES_PER_OCTAVE],
}

/// Cents between every pair of pitch classes in the lower octave of `table`
pub fn cents_matrix(table: &FrequencyTable) -> CentsMatrix {
    let base = table.base_note();
    let f = table.frequencies();
    let mut cells = [[0.0; NOTES_PER_OCTAVE]; NOTES_PER_OCTAVE];

    for i in 0..NOTES_PER_OCTAVE {
        let row = (i + base) % NOTES_PER_OCTAVE;
        for (j, cell) in cells[row].iter_mut().enumerate() {
            let upper = (i + j + base) % NOTES_PER_OCTAVE;
            let mut cents = 1200.0 * (f[upper] / f[row]).log2();
            if cents < 0.0 {
                cents += 1200.0;
            }
            *cell = cents;
        }
    }

    CentsMatrix {
        base_note: base,
        cells,
    }
}

/// Exact interval ratios of a just-intonation system laid out from `base_note`
pub fn ratio_matrix(system: TuningSystem, base_note: usize) -> SynthResult<RatioMatrix> {
    if base_note >= NOTES_PER_OCTAVE {
        return Err(SynthError::InvalidBaseNote(base_note));
    }
    let intervals = interval_ratios(system)?;
    let mut cells = [[Ratio::new(1, 1); NOTES_PER_OCTAVE]; NOTES_PER_OCTAVE];

    for i in 0..NOTES_PER_OCTAVE {
        let row = (i + base_note) % NOTES_PER_OCTAVE;
        for (j, cell) in cells[row].iter_mut().enumerate() {
            let mut ratio = intervals[(i + j) % NOTES_PER_OCTAVE] / intervals[i];
            if i + j >= NOTES_PER_OCTAVE {
                ratio = ratio * Ratio::new(2, 1);
            }
            *cell = ratio;
        }
    }

    Ok(RatioMatrix {
        system,
        base_note,
        cells,
    })
}

//! Multi-resolution Time Grid

use crate::error::GridError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A point in the multi-resolution grid: sample offset plus window length.
///
/// Equal positions with different windows are distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSpec {
    /// Frame start, in samples
    pub position: usize,
    /// Window length, in samples
    pub window: usize,
}

impl TimeSpec {
    pub fn new(position: usize, window: usize) -> Self {
        Self { position, window }
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.position, self.window)
    }
}

/// One analysis resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Multiplier of the base window
    pub factor: usize,
    /// Window length in samples
    pub window: usize,
    /// Hop between frame starts (half the window)
    pub shift: usize,
}

/// Window/shift pairs for every requested resolution factor
#[derive(Debug, Clone)]
pub struct TimeGrid {
    base_window: usize,
    /// Sorted by ascending factor
    resolutions: Vec<Resolution>,
}

impl TimeGrid {
    /// Build the grid for `base_window` and the given factors (duplicates collapse)
    pub fn new<I>(base_window: usize, factors: I) -> Result<Self, GridError>
    where
        I: IntoIterator<Item = usize>,
    {
        if base_window == 0 {
            return Err(GridError::InvalidWindowConfig(
                "base window must be positive".to_string(),
            ));
        }

        let factors: BTreeSet<usize> = factors.into_iter().collect();
        let mut resolutions = Vec::with_capacity(factors.len());
        for factor in factors {
            if factor == 0 {
                return Err(GridError::InvalidWindowConfig(
                    "resolution factor must be positive".to_string(),
                ));
            }
            let window = factor.checked_mul(base_window).ok_or_else(|| {
                GridError::InvalidWindowConfig(format!(
                    "window {} x {} overflows",
                    factor, base_window
                ))
            })?;
            let shift = window / 2;
            if shift == 0 {
                return Err(GridError::InvalidWindowConfig(format!(
                    "window {} yields a zero shift",
                    window
                )));
            }
            resolutions.push(Resolution {
                factor,
                window,
                shift,
            });
        }

        Ok(Self {
            base_window,
            resolutions,
        })
    }

    pub fn base_window(&self) -> usize {
        self.base_window
    }

    /// Resolutions in ascending factor order
    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    /// The resolution whose shift defines the output grid
    pub fn finest(&self) -> Option<&Resolution> {
        self.resolutions.first()
    }

    /// Smallest shift across all resolutions (0 if there are none)
    pub fn min_step(&self) -> usize {
        self.resolutions.iter().map(|r| r.shift).min().unwrap_or(0)
    }

    /// Lazily enumerate frame starts where a full window fits
    pub fn frames(&self, resolution: &Resolution, signal_len: usize) -> Frames {
        Frames {
            next: 0,
            window: resolution.window,
            shift: resolution.shift,
            signal_len,
        }
    }

    /// Number of frames [`frames`](Self::frames) yields
    pub fn frame_count(&self, resolution: &Resolution, signal_len: usize) -> usize {
        if signal_len < resolution.window {
            0
        } else {
            (signal_len - resolution.window) / resolution.shift + 1
        }
    }
}

/// Iterator over frame start positions of one resolution
#[derive(Debug, Clone)]
pub struct Frames {
    next: usize,
    window: usize,
    shift: usize,
    signal_len: usize,
}

impl Iterator for Frames {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let end = self.next.checked_add(self.window)?;
        if end > self.signal_len {
            return None;
        }
        let position = self.next;
        self.next += self.shift;
        Some(position)
    }
}

/// Express fine-grid index `i` (stepped at `min_step`) as an index into a
/// stream stepped at `other_step`.
pub fn map_index(i: usize, min_step: usize, other_step: usize) -> usize {
    i * min_step / other_step
}

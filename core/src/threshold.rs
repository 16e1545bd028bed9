//! Edge trimming and the adaptive two-class energy thresholds.
//!
//! The frame format guarantees a start bit (low tone) at least once every
//! frame, so valid data puts well over 8% of steps in each class; anything
//! below that floor means the refinement latched onto leader noise and the
//! global means are the safer estimate.

use crate::{CLASS_FLOOR, REFINE_PASSES, TRIM_DIVISOR};

/// Steps dropped from each end of the spectral series.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimReport {
    pub head: usize,
    pub tail: usize,
}

/// Class averages and membership after one refinement pass.
#[derive(Debug, Clone, Copy)]
pub struct RefinePass {
    pub avlo: f64,
    pub avhi: f64,
    pub low_count: usize,
    pub high_count: usize,
}

/// Final class thresholds, with the pass history that produced them.
#[derive(Debug, Clone)]
pub struct Thresholds {
    pub avlo: f64,
    pub avhi: f64,
    pub passes: Vec<RefinePass>,
    /// Refinement underflowed and the global means were restored.
    pub reverted: bool,
}

fn mean(values: &[f32]) -> f64 {
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

/// Drop near-silent steps from both ends of the spectral series in place.
///
/// A step is near-silent when both energies fall below a tenth of their
/// global means. Interior silence is left alone; the frame decoder handles
/// it as carrier gaps.
pub fn trim_edges(lo: &mut Vec<f32>, hi: &mut Vec<f32>) -> TrimReport {
    debug_assert_eq!(lo.len(), hi.len());
    if lo.is_empty() {
        return TrimReport::default();
    }
    let lo_floor = mean(lo) / TRIM_DIVISOR;
    let hi_floor = mean(hi) / TRIM_DIVISOR;
    let quiet = |l: f32, h: f32| (l as f64) < lo_floor && (h as f64) < hi_floor;

    let mut head = 0;
    while head < lo.len() && quiet(lo[head], hi[head]) {
        head += 1;
    }
    let mut end = lo.len();
    while end > head && quiet(lo[end - 1], hi[end - 1]) {
        end -= 1;
    }
    let tail = lo.len() - end;

    lo.drain(..head);
    lo.truncate(end - head);
    hi.drain(..head);
    hi.truncate(end - head);

    TrimReport { head, tail }
}

/// Refine per-class averages by repeated re-partitioning.
///
/// Each pass assigns every step to the class whose average its energy ratio
/// favours, then recomputes both averages. Reverts to the global means when
/// either class empties mid-loop or ends below the 8% floor.
pub fn refine_thresholds(lo: &[f32], hi: &[f32]) -> Thresholds {
    if lo.is_empty() {
        return Thresholds {
            avlo: 0.0,
            avhi: 0.0,
            passes: Vec::new(),
            reverted: false,
        };
    }

    let global_lo = mean(lo);
    let global_hi = mean(hi);
    let mut avlo = global_lo;
    let mut avhi = global_hi;
    let mut passes = Vec::new();
    let mut reverted = false;
    let mut low_count = 0;
    let mut high_count = 0;

    for _ in 0..REFINE_PASSES {
        let mut lo_sum = 0.0f64;
        let mut hi_sum = 0.0f64;
        low_count = 0;
        high_count = 0;
        for (&l, &h) in lo.iter().zip(hi) {
            if (l as f64) / avlo > (h as f64) / avhi {
                lo_sum += l as f64;
                low_count += 1;
            } else {
                hi_sum += h as f64;
                high_count += 1;
            }
        }
        if low_count == 0 || high_count == 0 {
            reverted = true;
            break;
        }
        avlo = lo_sum / low_count as f64;
        avhi = hi_sum / high_count as f64;
        passes.push(RefinePass {
            avlo,
            avhi,
            low_count,
            high_count,
        });
    }

    let floor = lo.len() as f64 * CLASS_FLOOR;
    if !reverted && ((low_count as f64) < floor || (high_count as f64) < floor) {
        reverted = true;
    }
    if reverted {
        avlo = global_lo;
        avhi = global_hi;
    }

    Thresholds {
        avlo,
        avhi,
        passes,
        reverted,
    }
}

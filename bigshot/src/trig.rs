//! Table-driven inverse trigonometry for the per-pixel projection loop
//!
//! Each table samples a monotone reference function at `resolution + 1`
//! uniformly spaced angles in `[0, π]`. A lookup is a binary search plus one
//! linear interpolation. Inputs outside the table saturate to the first or
//! last angle instead of extrapolating.

use std::f64::consts::{FRAC_PI_2, PI};

/// Monotone lookup table shared by [`FastAcos`] and [`FastAtan`].
#[derive(Debug, Clone)]
pub struct TrigLookupTable {
    lookup: Vec<f64>,
    step: f64,
}

impl TrigLookupTable {
    fn with_samples(resolution: usize, sample: impl Fn(usize, f64) -> f64) -> Self {
        let resolution = resolution.max(1);
        let step = PI / resolution as f64;
        let lookup = (0..=resolution).map(|i| sample(i, step)).collect();
        Self { lookup, step }
    }

    /// Angular spacing between samples.
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn resolution(&self) -> usize {
        self.lookup.len() - 1
    }

    /// Angle in `[0, resolution * step]` whose sample brackets `v`.
    pub fn angle(&self, v: f64) -> f64 {
        // partition_point = first index whose sample is >= v
        let idx = self.lookup.partition_point(|&s| s < v);
        if idx == self.lookup.len() {
            return self.resolution() as f64 * self.step;
        }
        if self.lookup[idx] == v {
            return idx as f64 * self.step;
        }
        if idx == 0 {
            return 0.0;
        }
        let a = self.lookup[idx - 1];
        let b = self.lookup[idx];
        let n = (v - a) / (b - a);
        (idx as f64 - 1.0 + n) * self.step
    }
}

/// `acos` over `[-1, 1]`, table built over `-cos`.
#[derive(Debug, Clone)]
pub struct FastAcos(TrigLookupTable);

impl FastAcos {
    pub fn new(resolution: usize) -> Self {
        let resolution = resolution.max(1);
        Self(TrigLookupTable::with_samples(resolution, |i, step| {
            if i == resolution {
                1.0
            } else {
                -(step * i as f64).cos()
            }
        }))
    }

    #[inline]
    pub fn acos(&self, v: f64) -> f64 {
        self.0.angle(-v)
    }

    pub fn table(&self) -> &TrigLookupTable {
        &self.0
    }
}

/// `atan` over the reals, table built over `tan` of `[-π/2, π/2]`.
#[derive(Debug, Clone)]
pub struct FastAtan(TrigLookupTable);

impl FastAtan {
    pub fn new(resolution: usize) -> Self {
        let resolution = resolution.max(1);
        Self(TrigLookupTable::with_samples(resolution, |i, step| {
            // tan is infinite at both ends; pin them half a step inside
            if i == 0 {
                (step / 2.0 - FRAC_PI_2).tan()
            } else if i == resolution {
                (FRAC_PI_2 - step / 2.0).tan()
            } else {
                (step * i as f64 - FRAC_PI_2).tan()
            }
        }))
    }

    #[inline]
    pub fn atan(&self, v: f64) -> f64 {
        self.0.angle(v) - FRAC_PI_2
    }

    pub fn table(&self) -> &TrigLookupTable {
        &self.0
    }
}

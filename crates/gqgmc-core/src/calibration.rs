//! Calibration model
//!
//! GMC devices store three calibration points, each a reference count rate
//! and the dose rate (µSv/h) it corresponds to. The dose-rate estimate for a
//! sample is the mean per-count sensitivity of the three points, scaled by
//! the observed count rate.

use serde::{Deserialize, Serialize};

/// One (reference CPM, reference dose rate) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Reference counts per minute
    pub cpm: u16,
    /// Reference dose rate in µSv/h
    pub dose_rate: f32,
}

impl CalibrationPoint {
    /// Sensitivity in nSv/h per CPM (dose rate * 1000 / cpm)
    ///
    /// A zero reference CPM yields an infinite or NaN sensitivity.
    pub fn sensitivity(&self) -> f32 {
        self.dose_rate * 1000.0 / f32::from(self.cpm)
    }

    /// A point with zero reference CPM cannot produce a finite sensitivity
    pub fn is_degenerate(&self) -> bool {
        self.cpm == 0
    }
}

/// The three calibration points read from the device configuration block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    points: [CalibrationPoint; 3],
}

impl CalibrationTable {
    /// Build a table; degenerate points are accepted
    pub fn new(points: [CalibrationPoint; 3]) -> Self {
        Self { points }
    }

    /// Calibration points in device order
    pub fn points(&self) -> &[CalibrationPoint; 3] {
        &self.points
    }

    /// Indices (1-based, as the device numbers them) of zero-CPM points
    pub fn degenerate_points(&self) -> Vec<usize> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_degenerate())
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// Mean sensitivity of the three points
    pub fn mean_sensitivity(&self) -> f32 {
        let sum: f32 = self.points.iter().map(CalibrationPoint::sensitivity).sum();
        sum / 3.0
    }

    /// Estimated dose rate in µSv/h for a CPM sample
    pub fn dose_rate(&self, cpm: u16) -> f32 {
        self.mean_sensitivity() * f32::from(cpm) / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(points: [(u16, f32); 3]) -> CalibrationTable {
        CalibrationTable::new(points.map(|(cpm, dose_rate)| CalibrationPoint { cpm, dose_rate }))
    }

    #[test]
    fn test_dose_rate_linear_table() {
        let t = table([(100, 1.0), (200, 2.0), (300, 3.0)]);
        assert_eq!(t.mean_sensitivity(), 10.0);
        assert!((t.dose_rate(150) - 1.5).abs() < 1e-6);
        assert_eq!(t.dose_rate(0), 0.0);
    }

    #[test]
    fn test_factory_calibration() {
        // GMC-320 factory defaults: 100/0.65, 30000/195, 25/0.1625
        let t = table([(100, 0.65), (30000, 195.0), (25, 0.1625)]);
        assert!((t.mean_sensitivity() - 6.5).abs() < 1e-4);
        assert!((t.dose_rate(20) - 0.13).abs() < 1e-5);
    }

    #[test]
    fn test_zero_reference_cpm_propagates() {
        let t = table([(0, 1.0), (200, 2.0), (300, 3.0)]);
        assert_eq!(t.degenerate_points(), vec![1]);
        assert!(t.dose_rate(150).is_infinite());

        let nan = table([(0, 0.0), (200, 2.0), (300, 3.0)]);
        assert!(nan.dose_rate(150).is_nan());
    }

    #[test]
    fn test_no_degenerate_points() {
        let t = table([(100, 1.0), (200, 2.0), (300, 3.0)]);
        assert!(t.degenerate_points().is_empty());
    }
}

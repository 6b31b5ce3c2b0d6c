//! filter.rs
//! Change-threshold filter: keeps a reading only when it moved far enough
//! from the last accepted value.
//! - Normal: within ±normal% of the reference (dropped)
//! - Elevated: within ±critical% but outside ±normal% (queued)
//! - Critical: outside ±critical% (queued + immediate transmitter wake)

use crate::error::SubmitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Normal,
    Elevated,
    Critical,
}

impl Classification {
    /// Whether the reading carries enough change to be recorded.
    pub fn is_novel(self) -> bool {
        !matches!(self, Classification::Normal)
    }
}

/// Percentage bands around the reference. Both edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub normal_pct: f32,
    pub critical_pct: f32,
}

impl Tolerance {
    pub fn new(normal_pct: f32, critical_pct: f32) -> Self {
        Self {
            normal_pct,
            critical_pct,
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::new(5.0, 15.0)
    }
}

/// Classifies `value` against `reference`.
///
/// Bands scale with `|reference|`, edges inclusive. A `+inf` reference means nothing has
/// been accepted yet: the first reading is always accepted as `Elevated`,
/// without forcing a wake.
pub fn classify(value: f32, reference: f32, tolerance: Tolerance) -> Classification {
    if reference == f32::INFINITY {
        return Classification::Elevated;
    }

    let deviation = (f64::from(value) - f64::from(reference)).abs();
    let scale = f64::from(reference).abs() / 100.0;

    if deviation <= scale * f64::from(tolerance.normal_pct) {
        Classification::Normal
    } else if deviation <= scale * f64::from(tolerance.critical_pct) {
        Classification::Elevated
    } else {
        Classification::Critical
    }
}

/// Reference holder. Not synchronised itself; `Pipeline` serialises access.
#[derive(Debug, Clone)]
pub struct ThresholdFilter {
    reference: f32,
    tolerance: Tolerance,
}

impl ThresholdFilter {
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            reference: f32::INFINITY,
            tolerance,
        }
    }

    pub fn reference(&self) -> f32 {
        self.reference
    }

    pub fn evaluate(&self, value: f32) -> Classification {
        classify(value, self.reference, self.tolerance)
    }

    /// Records `value` as the new reference.
    pub fn accept(&mut self, value: f32) {
        self.reference = value;
    }

    /// Seeds the reference. Only finite values; use `reset` to forget it.
    pub fn set_reference(&mut self, reference: f32) -> Result<(), SubmitError> {
        if !reference.is_finite() {
            return Err(SubmitError::NonFiniteReference { value: reference });
        }
        self.reference = reference;
        Ok(())
    }

    /// Forgets the reference; the next reading is accepted unconditionally.
    pub fn reset(&mut self) {
        self.reference = f32::INFINITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands() -> Tolerance {
        Tolerance::default()
    }

    #[test]
    fn infinite_reference_accepts_any_value() {
        for value in [0.0, -40.0, 27.0, 1.0e9] {
            assert_eq!(classify(value, f32::INFINITY, bands()), Classification::Elevated);
        }
    }

    #[test]
    fn first_reading_sets_reference() {
        let mut filter = ThresholdFilter::new(bands());
        let class = filter.evaluate(27.0);
        assert!(class.is_novel());
        filter.accept(27.0);
        assert_eq!(filter.reference(), 27.0);
    }

    #[test]
    fn bands_around_reference() {
        assert_eq!(classify(100.0, 100.0, bands()), Classification::Normal);
        assert_eq!(classify(104.0, 100.0, bands()), Classification::Normal);
        assert_eq!(classify(96.0, 100.0, bands()), Classification::Normal);
        assert_eq!(classify(108.0, 100.0, bands()), Classification::Elevated);
        assert_eq!(classify(90.0, 100.0, bands()), Classification::Elevated);
        assert_eq!(classify(120.0, 100.0, bands()), Classification::Critical);
        assert_eq!(classify(80.0, 100.0, bands()), Classification::Critical);
    }

    #[test]
    fn band_edges_are_inclusive() {
        assert_eq!(classify(105.0, 100.0, bands()), Classification::Normal);
        assert_eq!(classify(115.0, 100.0, bands()), Classification::Elevated);
    }

    #[test]
    fn negative_reference_uses_magnitude() {
        assert_eq!(classify(-102.0, -100.0, bands()), Classification::Normal);
        assert_eq!(classify(-110.0, -100.0, bands()), Classification::Elevated);
        assert_eq!(classify(-130.0, -100.0, bands()), Classification::Critical);
    }

    #[test]
    fn zero_reference_only_tolerates_zero() {
        assert_eq!(classify(0.0, 0.0, bands()), Classification::Normal);
        assert_eq!(classify(0.1, 0.0, bands()), Classification::Critical);
    }

    #[test]
    fn reset_restores_unconditional_acceptance() {
        let mut filter = ThresholdFilter::new(bands());
        filter.set_reference(50.0).unwrap();
        assert_eq!(filter.evaluate(50.5), Classification::Normal);
        filter.reset();
        assert_eq!(filter.evaluate(50.5), Classification::Elevated);
    }

    #[test]
    fn non_finite_seed_is_refused_and_reference_kept() {
        let mut filter = ThresholdFilter::new(bands());
        filter.set_reference(100.0).unwrap();
        for seed in [f32::NEG_INFINITY, f32::INFINITY, f32::NAN] {
            assert!(matches!(
                filter.set_reference(seed),
                Err(SubmitError::NonFiniteReference { .. })
            ));
        }
        assert_eq!(filter.reference(), 100.0);
        assert_eq!(filter.evaluate(130.0), Classification::Critical);
    }
}

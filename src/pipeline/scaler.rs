use {
    crate::{
        domain::{OhlcField, OhlcRecord, ScaledRecord},
        pipeline::MinMaxSnapshot,
    },
    strum::IntoEnumIterator,
    thiserror::Error,
};

#[derive(Debug, Error, PartialEq)]
pub enum ScalerError {
    #[error("headroom must be finite and non-negative, got {0}")]
    InvalidHeadroom(f64),
    #[error("snapshot bound for {0} is not finite")]
    NonFiniteBound(OhlcField),
}

/// Min-max transform into `[0, 1]`, with headroom above the observed maximum
/// so forecasts near the historical peak stay in range.
///
/// A field whose bounds coincide scales to `0.0` and de-scales to its minimum.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    min: OhlcRecord,
    max: OhlcRecord,
}

impl Scaler {
    pub fn build(snapshot: &MinMaxSnapshot, headroom_pct: f64) -> Result<Self, ScalerError> {
        if !headroom_pct.is_finite() || headroom_pct < 0.0 {
            return Err(ScalerError::InvalidHeadroom(headroom_pct));
        }

        let min = snapshot.minimum;
        let mut max = snapshot.maximum;
        for field in OhlcField::iter() {
            let (lo, hi) = (min.get(field), max.get(field));
            if !lo.is_finite() || !hi.is_finite() {
                return Err(ScalerError::NonFiniteBound(field));
            }
            max.set(field, hi + headroom_pct * hi);
        }

        Ok(Self { min, max })
    }

    fn range(&self, field: OhlcField) -> Option<f64> {
        let range = self.max.get(field) - self.min.get(field);
        (range != 0.0).then_some(range)
    }

    pub fn scale_field(&self, field: OhlcField, value: f64) -> f64 {
        match self.range(field) {
            Some(range) => (value - self.min.get(field)) / range,
            None => 0.0,
        }
    }

    pub fn descale_field(&self, field: OhlcField, value: f64) -> f64 {
        match self.range(field) {
            Some(range) => value * range + self.min.get(field),
            None => self.min.get(field),
        }
    }

    pub fn descale_close(&self, value: f64) -> f64 {
        self.descale_field(OhlcField::Close, value)
    }

    pub fn scale(&self, record: &OhlcRecord) -> ScaledRecord {
        let mut scaled = *record;
        for field in OhlcField::iter() {
            scaled.set(field, self.scale_field(field, record.get(field)));
        }
        ScaledRecord(scaled)
    }

    pub fn descale(&self, record: &ScaledRecord) -> OhlcRecord {
        let mut raw = record.0;
        for field in OhlcField::iter() {
            raw.set(field, self.descale_field(field, record.get(field)));
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::MinMaxTracker;

    fn snapshot(lo: f64, hi: f64) -> MinMaxSnapshot {
        MinMaxSnapshot {
            minimum: OhlcRecord::splat(1, lo),
            maximum: OhlcRecord::splat(2, hi),
        }
    }

    #[test]
    fn zero_headroom_maps_bounds_to_unit_interval() {
        let mut tracker = MinMaxTracker::new();
        for open in [10.0, 20.0, 5.0] {
            tracker.assess(&OhlcRecord {
                date: 1,
                open,
                ..OhlcRecord::default()
            });
        }
        let scaler = Scaler::build(&tracker.snapshot().unwrap(), 0.0).unwrap();

        assert_eq!(scaler.scale_field(OhlcField::Open, 5.0), 0.0);
        assert_eq!(scaler.scale_field(OhlcField::Open, 20.0), 1.0);
        assert_eq!(scaler.scale_field(OhlcField::Open, 12.5), 0.5);
    }

    #[test]
    fn headroom_lifts_only_the_maximum() {
        let scaler = Scaler::build(&snapshot(0.0, 100.0), 0.05).unwrap();
        assert!((scaler.scale_field(OhlcField::Close, 105.0) - 1.0).abs() < 1e-12);
        assert_eq!(scaler.scale_field(OhlcField::Close, 0.0), 0.0);
    }

    #[test]
    fn round_trip_every_field() {
        let scaler = Scaler::build(&snapshot(3.0, 250.0), 0.05).unwrap();
        let record = OhlcRecord::new(1_600_000_000, 10.0, 200.0, 3.5, 99.9, 120.0, 42.0, 7.25);

        let scaled = scaler.scale(&record);
        assert_eq!(scaled.date, record.date);
        let back = scaler.descale(&scaled);
        for field in OhlcField::iter() {
            assert!(
                (back.get(field) - record.get(field)).abs() < 1e-9,
                "{} drifted",
                field
            );
        }
    }

    #[test]
    fn degenerate_field_scales_to_zero_and_descales_to_min() {
        let scaler = Scaler::build(&snapshot(0.0, 0.0), 0.05).unwrap();
        assert_eq!(scaler.scale_field(OhlcField::Volume, 0.0), 0.0);
        assert_eq!(scaler.scale_field(OhlcField::Volume, 3.0), 0.0);
        assert_eq!(scaler.descale_close(0.7), 0.0);
        assert!(scaler.scale(&OhlcRecord::splat(5, 1.0)).close.is_finite());
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert_eq!(
            Scaler::build(&snapshot(0.0, 1.0), -0.1),
            Err(ScalerError::InvalidHeadroom(-0.1))
        );
        assert!(matches!(
            Scaler::build(&snapshot(f64::NAN, 1.0), 0.0),
            Err(ScalerError::NonFiniteBound(_))
        ));
    }
}

use crate::domain::ScaledRecord;

/// Model input columns per record, in this order.
pub const FEATURE_COUNT: usize = 5;

pub fn features(record: &ScaledRecord) -> [f64; FEATURE_COUNT] {
    [
        record.high,
        record.low,
        record.open,
        record.weighted_average,
        record.close,
    ]
}

/// One supervised example: `lookback` inputs followed by `lookforward` close targets.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub inputs: Vec<ScaledRecord>,
    pub targets: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub examples: Vec<TrainingExample>,
    pub lookback: usize,
    pub lookforward: usize,
}

impl TrainingSet {
    /// Stride-1 convolution of an ordered scaled series.
    pub fn convolve(series: &[ScaledRecord], lookback: usize, lookforward: usize) -> Self {
        let span = lookback + lookforward;
        let examples = if lookback == 0 || lookforward == 0 || series.len() < span {
            Vec::new()
        } else {
            series
                .windows(span)
                .map(|chunk| TrainingExample {
                    inputs: chunk[..lookback].to_vec(),
                    targets: chunk[lookback..].iter().map(|r| r.close).collect(),
                })
                .collect()
        };

        Self {
            examples,
            lookback,
            lookforward,
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OhlcRecord;

    fn series(n: usize) -> Vec<ScaledRecord> {
        (0..n)
            .map(|i| ScaledRecord(OhlcRecord::splat(i as i64 + 1, i as f64 / 10.0)))
            .collect()
    }

    #[test]
    fn every_offset_becomes_one_example() {
        let set = TrainingSet::convolve(&series(6), 3, 1);
        assert_eq!(set.len(), 3);
        assert_eq!(set.examples[0].inputs.len(), 3);
        assert_eq!(set.examples[0].targets, vec![0.3]);
        assert_eq!(set.examples[2].inputs[0].date, 3);
    }

    #[test]
    fn short_series_yields_nothing() {
        assert!(TrainingSet::convolve(&series(3), 3, 1).is_empty());
        assert!(TrainingSet::convolve(&series(10), 0, 1).is_empty());
    }

    #[test]
    fn feature_order_ends_with_close() {
        let record = ScaledRecord(OhlcRecord::new(1, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7));
        assert_eq!(features(&record), [0.2, 0.3, 0.1, 0.5, 0.4]);
    }
}

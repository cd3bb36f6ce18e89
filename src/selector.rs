use crate::error::ConfigurationError;
use crate::operation::OperationKind;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng, random};

/// Relative weight of each operation kind.
///
/// Weights are percentages by convention but only their proportions matter,
/// so `{create: 10, read: 10}` and `{create: 50, read: 50}` draw identically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightSpec {
    weights: Vec<(OperationKind, f64)>,
}

impl WeightSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: OperationKind, percent: f64) -> Self {
        self.weights.push((kind, percent));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &(OperationKind, f64)> {
        self.weights.iter()
    }

    /// Weight per kind, indexed by [`OperationKind::index`]. Repeated kinds add up.
    fn per_kind(&self) -> Result<[f64; OperationKind::COUNT], ConfigurationError> {
        let mut out = [0.0; OperationKind::COUNT];
        for &(kind, weight) in &self.weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigurationError::InvalidWeight { kind, weight });
            }
            out[kind.index()] += weight;
        }
        Ok(out)
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().map(|(_, w)| w).sum()
    }

    /// Checks everything `select` would trip over, without drawing.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let per_kind = self.per_kind()?;
        if per_kind.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigurationError::ZeroTotalWeight);
        }
        Ok(())
    }
}

impl FromIterator<(OperationKind, f64)> for WeightSpec {
    fn from_iter<T: IntoIterator<Item = (OperationKind, f64)>>(iter: T) -> Self {
        WeightSpec {
            weights: iter.into_iter().collect(),
        }
    }
}

/// Draws operation kinds according to a [`WeightSpec`].
///
/// Holds a cumulative table in [`OperationKind`] order: entry `i` is the sum of
/// the weights of kinds `0..=i`. A draw `x` in `[0, total)` maps to the first
/// entry strictly greater than `x`, so zero-weight kinds are never returned.
pub struct WeightedOperationSelector {
    cumulative: [f64; OperationKind::COUNT],
    total: f64,
    rng: SmallRng,
}

impl WeightedOperationSelector {
    /// Rejects negative or non-finite weights. A zero total is accepted here and
    /// reported by every call to [`select`](Self::select).
    pub fn new(spec: &WeightSpec) -> Result<Self, ConfigurationError> {
        Self::with_seed(spec, random())
    }

    pub fn with_seed(spec: &WeightSpec, seed: u64) -> Result<Self, ConfigurationError> {
        let per_kind = spec.per_kind()?;
        let mut cumulative = [0.0; OperationKind::COUNT];
        let mut running = 0.0;
        for (slot, weight) in cumulative.iter_mut().zip(per_kind) {
            running += weight;
            *slot = running;
        }
        Ok(WeightedOperationSelector {
            cumulative,
            total: running,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    pub fn select(&mut self) -> Result<OperationKind, ConfigurationError> {
        if self.total <= 0.0 {
            return Err(ConfigurationError::ZeroTotalWeight);
        }
        let x: f64 = self.rng.random_range(0.0..self.total);
        Ok(self.kind_for(x))
    }

    fn kind_for(&self, x: f64) -> OperationKind {
        let idx = self.cumulative.partition_point(|&c| c <= x);
        match OperationKind::ALL.get(idx) {
            Some(kind) => *kind,
            // Only reachable through rounding at the very top of the range.
            None => self.last_weighted(),
        }
    }

    fn last_weighted(&self) -> OperationKind {
        let mut prev = 0.0;
        let mut last = OperationKind::ALL[0];
        for (kind, &c) in OperationKind::ALL.iter().zip(&self.cumulative) {
            if c > prev {
                last = *kind;
            }
            prev = c;
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use OperationKind::*;

    const DRAWS: usize = 100_000;

    fn frequencies(spec: &WeightSpec, seed: u64) -> [f64; OperationKind::COUNT] {
        let mut selector = WeightedOperationSelector::with_seed(spec, seed).unwrap();
        let mut counts = [0usize; OperationKind::COUNT];
        for _ in 0..DRAWS {
            counts[selector.select().unwrap().index()] += 1;
        }
        counts.map(|c| c as f64 / DRAWS as f64)
    }

    #[test]
    fn converges_to_configured_proportions() {
        let spec = WeightSpec::new()
            .with(Create, 20.0)
            .with(Append, 20.0)
            .with(Read, 16.0)
            .with(Rename, 20.0)
            .with(Delete, 15.0)
            .with(ListFile, 5.0)
            .with(ChmodFile, 4.0);
        let freq = frequencies(&spec, 7);
        for &(kind, weight) in spec.iter() {
            let expected = weight / 100.0;
            let got = freq[kind.index()];
            assert!(
                (got - expected).abs() < 0.01,
                "{kind}: expected {expected}, got {got}"
            );
        }
        assert_eq!(freq[ListDir.index()], 0.0);
        assert_eq!(freq[StatDir.index()], 0.0);
    }

    #[test]
    fn unnormalized_weights_keep_relative_frequencies() {
        let small = WeightSpec::new()
            .with(Create, 10.0)
            .with(Append, 10.0)
            .with(Read, 8.0);
        let large = WeightSpec::new()
            .with(Create, 50.0)
            .with(Append, 50.0)
            .with(Read, 40.0);

        let a = frequencies(&small, 1);
        let b = frequencies(&large, 2);
        for (kind, expected) in [(Create, 10.0 / 28.0), (Append, 10.0 / 28.0), (Read, 8.0 / 28.0)] {
            assert!((a[kind.index()] - expected).abs() < 0.01);
            assert!((b[kind.index()] - expected).abs() < 0.01);
            assert!((a[kind.index()] - b[kind.index()]).abs() < 0.015);
        }
    }

    #[test]
    fn zero_total_weight_never_selects() {
        let spec = WeightSpec::new().with(Create, 0.0).with(Read, 0.0);
        let mut selector = WeightedOperationSelector::with_seed(&spec, 3).unwrap();
        for _ in 0..10 {
            assert_eq!(selector.select(), Err(ConfigurationError::ZeroTotalWeight));
        }
        assert_eq!(spec.validate(), Err(ConfigurationError::ZeroTotalWeight));
        assert_eq!(
            WeightSpec::new().validate(),
            Err(ConfigurationError::ZeroTotalWeight)
        );
    }

    #[test]
    fn negative_weight_is_rejected() {
        let spec = WeightSpec::new().with(Create, 10.0).with(Delete, -1.0);
        assert!(matches!(
            WeightedOperationSelector::new(&spec),
            Err(ConfigurationError::InvalidWeight { kind: Delete, .. })
        ));
        let spec = WeightSpec::new().with(Read, f64::NAN);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn boundaries_map_to_the_next_kind() {
        let spec = WeightSpec::new().with(Create, 1.0).with(Read, 1.0);
        let selector = WeightedOperationSelector::with_seed(&spec, 0).unwrap();
        assert_eq!(selector.kind_for(0.0), Create);
        assert_eq!(selector.kind_for(0.999), Create);
        assert_eq!(selector.kind_for(1.0), Read);
        assert_eq!(selector.kind_for(2.0), Read);
    }

    #[test]
    fn single_kind_always_wins() {
        let spec = WeightSpec::new().with(StatDir, 3.0);
        let mut selector = WeightedOperationSelector::with_seed(&spec, 11).unwrap();
        for _ in 0..1_000 {
            assert_eq!(selector.select().unwrap(), StatDir);
        }
    }

    proptest! {
        #[test]
        fn never_selects_unweighted_kind(
            weights in prop::collection::vec(0u32..100, OperationKind::COUNT),
            seed in any::<u64>(),
        ) {
            prop_assume!(weights.iter().any(|&w| w > 0));
            let spec: WeightSpec = OperationKind::ALL
                .iter()
                .zip(&weights)
                .map(|(k, &w)| (*k, w as f64))
                .collect();
            let mut selector = WeightedOperationSelector::with_seed(&spec, seed).unwrap();
            for _ in 0..200 {
                let kind = selector.select().unwrap();
                prop_assert!(weights[kind.index()] > 0, "drew unweighted {}", kind);
            }
        }
    }
}

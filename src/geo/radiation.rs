//! Radiation-model flow tables.
//!
//! For a source region with population `m`, each neighbouring region `j` (taken nearest first)
//! with population `n` receives weight `m·n / (s·(s + n))`, where `s` is the population of the
//! neighbours closer than `j`, not counting the source. A neighbour with a zero denominator
//! gets weight zero. When no neighbour ends up with a positive weight the table sends every
//! trip back to the source region.

use std::rc::Rc;

use log::warn;

use crate::geo::RegionId;
use crate::rand::Rng;
use crate::random::sample_cumulative;
use crate::{HashMap, HashMapExt};

/// Unnormalized distribution over destination regions for trips out of one source region.
#[derive(Clone, Debug, PartialEq)]
pub struct RadiationFlowTable {
    source: RegionId,
    targets: Vec<RegionId>,
    weights: Vec<f64>,
}

impl RadiationFlowTable {
    /// A table that keeps every trip inside `source`.
    #[must_use]
    pub fn self_loop(source: RegionId) -> Self {
        RadiationFlowTable {
            source,
            targets: vec![source],
            weights: vec![1.0],
        }
    }

    /// Builds the table for `source` from `neighbours`, a nearest-first list of regions and
    /// their populations. The source region may appear in the list; it is skipped.
    pub fn build(
        source: RegionId,
        source_population: usize,
        neighbours: impl IntoIterator<Item = (RegionId, usize)>,
    ) -> Self {
        let mut targets = Vec::new();
        let mut weights = Vec::new();
        let mut cumulative = 0.0;

        #[allow(clippy::cast_precision_loss)]
        let source_population = source_population as f64;
        for (region, population) in neighbours {
            if region == source {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let population = population as f64;
            let denominator = cumulative * (cumulative + population);
            let weight = if denominator > 0.0 {
                source_population * population / denominator
            } else {
                0.0
            };
            targets.push(region);
            weights.push(weight);
            cumulative += population;
        }

        if targets.is_empty() {
            warn!("region {source} has no neighbours within the mobility radius; using a self-loop");
            return Self::self_loop(source);
        }
        if cumulative <= 0.0 || !weights.iter().any(|weight| *weight > 0.0) {
            warn!("no neighbour of region {source} received a positive radiation weight; using a self-loop");
            return Self::self_loop(source);
        }

        RadiationFlowTable {
            source,
            targets,
            weights,
        }
    }

    #[must_use]
    pub fn source(&self) -> RegionId {
        self.source
    }

    #[must_use]
    pub fn targets(&self) -> &[RegionId] {
        &self.targets
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.targets.as_slice() == [self.source]
    }

    /// Draws a destination with probability proportional to its weight.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> RegionId {
        // A table always holds a positive weight, so the draw cannot come back empty.
        sample_cumulative(rng, &self.weights).map_or(self.source, |index| self.targets[index])
    }
}

/// Flow tables keyed by source region. Entries are built on demand and live until
/// `invalidate` is called.
#[derive(Debug, Default)]
pub struct RadiationFlowCache {
    tables: HashMap<RegionId, Rc<RadiationFlowTable>>,
}

impl RadiationFlowCache {
    #[must_use]
    pub fn get(&self, source: RegionId) -> Option<Rc<RadiationFlowTable>> {
        self.tables.get(&source).cloned()
    }

    pub fn insert(&mut self, source: RegionId, table: Rc<RadiationFlowTable>) {
        self.tables.insert(source, table);
    }

    pub fn invalidate(&mut self) {
        self.tables = HashMap::new();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;
    use crate::assert_almost_eq;

    const A: RegionId = RegionId(1);
    const B: RegionId = RegionId(2);
    const C: RegionId = RegionId(3);
    const D: RegionId = RegionId(4);

    #[test]
    fn first_neighbour_has_zero_weight() {
        let table = RadiationFlowTable::build(A, 100, [(A, 100), (B, 300), (C, 200), (D, 500)]);
        assert_eq!(table.targets(), &[B, C, D]);
        assert_almost_eq!(table.weights()[0], 0.0, 1e-12);
        assert_almost_eq!(table.weights()[1], 100.0 * 200.0 / (300.0 * 500.0), 1e-12);
        assert_almost_eq!(table.weights()[2], 100.0 * 500.0 / (500.0 * 1000.0), 1e-12);
        assert!(table.weights().iter().all(|weight| *weight >= 0.0));
        assert!(!table.is_self_loop());
    }

    #[test]
    fn single_neighbour_falls_back_to_self_loop() {
        let table = RadiationFlowTable::build(A, 100, [(A, 100), (B, 300)]);
        assert!(table.is_self_loop());
        assert_eq!(table.weights(), &[1.0]);
    }

    #[test]
    fn isolated_region_falls_back_to_self_loop() {
        assert!(RadiationFlowTable::build(A, 100, [(A, 100)]).is_self_loop());
        assert!(RadiationFlowTable::build(A, 100, []).is_self_loop());
    }

    #[test]
    fn empty_neighbourhood_falls_back_to_self_loop() {
        let table = RadiationFlowTable::build(A, 100, [(B, 0), (C, 0), (D, 0)]);
        assert!(table.is_self_loop());
    }

    #[test]
    fn empty_closer_neighbours_give_zero_weight() {
        // B is empty, so C still sees a zero denominator; D sees C's population.
        let table = RadiationFlowTable::build(A, 50, [(B, 0), (C, 10), (D, 30)]);
        assert_almost_eq!(table.weights()[1], 0.0, 1e-12);
        assert_almost_eq!(table.weights()[2], 50.0 * 30.0 / (10.0 * 40.0), 1e-12);
    }

    #[test]
    fn sampling_never_picks_a_zero_weight_target() {
        let table = RadiationFlowTable::build(A, 100, [(B, 300), (C, 200), (D, 500)]);
        let mut rng = SmallRng::seed_from_u64(3);
        let mut c_count = 0;
        for _ in 0..2000 {
            let target = table.sample(&mut rng);
            assert_ne!(target, B);
            if target == C {
                c_count += 1;
            }
        }
        // C weighs 0.1333 against D's 0.1, so it should be drawn about 57% of the time.
        assert!((1000..1300).contains(&c_count), "{c_count}");
    }

    #[test]
    fn self_loop_always_samples_the_source() {
        let table = RadiationFlowTable::self_loop(A);
        let mut rng = SmallRng::seed_from_u64(1);
        assert!((0..100).all(|_| table.sample(&mut rng) == A));
    }

    #[test]
    fn cache_invalidation() {
        let mut cache = RadiationFlowCache::default();
        assert!(cache.is_empty());
        cache.insert(A, Rc::new(RadiationFlowTable::self_loop(A)));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(A).is_some());
        assert!(cache.get(B).is_none());
        cache.invalidate();
        assert!(cache.get(A).is_none());
    }
}

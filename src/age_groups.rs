//! Age groups and the age-indexed weight tables built on them.
//!
//! An `AgeGroups` value is an ordered partition of ages into named bins. Configuration refers
//! to bins by name (`AgeWeightTable`, `PairwiseAgeWeights`); at initialization those tables are
//! resolved into dense vectors and matrices indexed by `AgeGroupIndex` so the hot sampling
//! paths never touch strings.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::TransmissionError;
use crate::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgeGroupIndex(pub usize);

impl Display for AgeGroupIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One bin of the partition, covering ages from `min_age` up to the next bin's `min_age`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeGroupBin {
    pub name: String,
    pub min_age: u32,
}

impl AgeGroupBin {
    pub fn new(name: impl Into<String>, min_age: u32) -> Self {
        AgeGroupBin {
            name: name.into(),
            min_age,
        }
    }
}

/// An exhaustive, non-overlapping partition of ages. The first bin starts at 0, lower bounds
/// strictly increase, the last bin is unbounded, and names are unique.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AgeGroupBin>", into = "Vec<AgeGroupBin>")]
pub struct AgeGroups {
    bins: Vec<AgeGroupBin>,
}

impl AgeGroups {
    /// # Errors
    ///
    /// Returns `TransmissionError::InvalidAgeGroups` if the bins do not form a partition.
    pub fn new(bins: Vec<AgeGroupBin>) -> Result<Self, TransmissionError> {
        let first = bins
            .first()
            .ok_or_else(|| TransmissionError::InvalidAgeGroups("no age groups given".to_string()))?;
        if first.min_age != 0 {
            return Err(TransmissionError::InvalidAgeGroups(format!(
                "first age group {} starts at {} instead of 0",
                first.name, first.min_age
            )));
        }
        for pair in bins.windows(2) {
            if pair[1].min_age <= pair[0].min_age {
                return Err(TransmissionError::InvalidAgeGroups(format!(
                    "age group {} must start after {}",
                    pair[1].name, pair[0].name
                )));
            }
        }
        for (i, bin) in bins.iter().enumerate() {
            if bins[..i].iter().any(|other| other.name == bin.name) {
                return Err(TransmissionError::InvalidAgeGroups(format!(
                    "duplicate age group name {}",
                    bin.name
                )));
            }
        }
        Ok(AgeGroups { bins })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Returns the bin containing `age`.
    #[must_use]
    pub fn group_for_age(&self, age: u32) -> AgeGroupIndex {
        // The first bin starts at 0, so at least one bin qualifies.
        let position = self.bins.partition_point(|bin| bin.min_age <= age);
        AgeGroupIndex(position - 1)
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<AgeGroupIndex> {
        self.bins
            .iter()
            .position(|bin| bin.name == name)
            .map(AgeGroupIndex)
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn name(&self, index: AgeGroupIndex) -> &str {
        &self.bins[index.0].name
    }

    pub fn indices(&self) -> impl Iterator<Item = AgeGroupIndex> {
        (0..self.bins.len()).map(AgeGroupIndex)
    }

    fn require_known(&self, name: &str, table: &str) -> Result<AgeGroupIndex, TransmissionError> {
        self.index_of(name).ok_or_else(|| {
            TransmissionError::IllegalParameter(format!("{table} refers to unknown age group {name}"))
        })
    }
}

impl TryFrom<Vec<AgeGroupBin>> for AgeGroups {
    type Error = TransmissionError;

    fn try_from(bins: Vec<AgeGroupBin>) -> Result<Self, Self::Error> {
        AgeGroups::new(bins)
    }
}

impl From<AgeGroups> for Vec<AgeGroupBin> {
    fn from(age_groups: AgeGroups) -> Self {
        age_groups.bins
    }
}

fn default_weight() -> f64 {
    1.0
}

fn check_weight(value: f64, what: &str) -> Result<(), TransmissionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TransmissionError::IllegalParameter(format!(
            "{what} must be a non-negative number, got {value}"
        )))
    }
}

/// Weight per age-group name, with a default for groups that are not listed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeWeightTable {
    #[serde(default = "default_weight")]
    pub default: f64,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
}

impl Default for AgeWeightTable {
    fn default() -> Self {
        AgeWeightTable::uniform(1.0)
    }
}

impl AgeWeightTable {
    #[must_use]
    pub fn uniform(default: f64) -> Self {
        AgeWeightTable {
            default,
            weights: HashMap::default(),
        }
    }

    #[must_use]
    pub fn with_weight(mut self, name: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(name.into(), weight);
        self
    }

    #[must_use]
    pub fn weight(&self, name: &str) -> f64 {
        self.weights.get(name).copied().unwrap_or(self.default)
    }

    /// Resolves the table into one weight per age group, in index order.
    ///
    /// # Errors
    ///
    /// Fails if a weight is negative or not finite, or if a listed name is not an age group.
    pub fn resolve(&self, age_groups: &AgeGroups, table: &str) -> Result<Vec<f64>, TransmissionError> {
        check_weight(self.default, table)?;
        for (name, weight) in &self.weights {
            age_groups.require_known(name, table)?;
            check_weight(*weight, table)?;
        }
        Ok(age_groups
            .indices()
            .map(|index| self.weight(age_groups.name(index)))
            .collect())
    }
}

/// Source-age × target-age weights keyed by name; unlisted pairs take `default`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairwiseAgeWeights {
    #[serde(default = "default_weight")]
    pub default: f64,
    #[serde(default)]
    pub weights: HashMap<String, HashMap<String, f64>>,
}

impl PairwiseAgeWeights {
    #[must_use]
    pub fn uniform(default: f64) -> Self {
        PairwiseAgeWeights {
            default,
            weights: HashMap::default(),
        }
    }

    #[must_use]
    pub fn with_weight(mut self, source: impl Into<String>, target: impl Into<String>, weight: f64) -> Self {
        self.weights
            .entry(source.into())
            .or_default()
            .insert(target.into(), weight);
        self
    }

    /// # Errors
    ///
    /// Fails if a weight is negative or not finite, or if a listed name is not an age group.
    pub fn resolve(&self, age_groups: &AgeGroups, table: &str) -> Result<AgeMatrix, TransmissionError> {
        check_weight(self.default, table)?;
        let size = age_groups.len();
        let mut matrix = AgeMatrix {
            size,
            values: vec![self.default; size * size],
        };
        for (source, targets) in &self.weights {
            let source = age_groups.require_known(source, table)?;
            for (target, weight) in targets {
                let target = age_groups.require_known(target, table)?;
                check_weight(*weight, table)?;
                matrix.values[source.0 * size + target.0] = *weight;
            }
        }
        Ok(matrix)
    }
}

/// Dense source × target weights indexed by `AgeGroupIndex`.
#[derive(Clone, Debug, PartialEq)]
pub struct AgeMatrix {
    size: usize,
    values: Vec<f64>,
}

impl AgeMatrix {
    #[must_use]
    pub fn get(&self, source: AgeGroupIndex, target: AgeGroupIndex) -> f64 {
        self.values[source.0 * self.size + target.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_adult_senior() -> AgeGroups {
        AgeGroups::new(vec![
            AgeGroupBin::new("child", 0),
            AgeGroupBin::new("adult", 18),
            AgeGroupBin::new("senior", 65),
        ])
        .unwrap()
    }

    #[test]
    fn every_age_maps_to_exactly_one_group() {
        let groups = child_adult_senior();
        assert_eq!(groups.group_for_age(0), AgeGroupIndex(0));
        assert_eq!(groups.group_for_age(17), AgeGroupIndex(0));
        assert_eq!(groups.group_for_age(18), AgeGroupIndex(1));
        assert_eq!(groups.group_for_age(64), AgeGroupIndex(1));
        assert_eq!(groups.group_for_age(65), AgeGroupIndex(2));
        assert_eq!(groups.group_for_age(120), AgeGroupIndex(2));
    }

    #[test]
    fn partitions_must_start_at_zero_and_increase() {
        assert!(matches!(
            AgeGroups::new(vec![]),
            Err(TransmissionError::InvalidAgeGroups(_))
        ));
        assert!(matches!(
            AgeGroups::new(vec![AgeGroupBin::new("adult", 18)]),
            Err(TransmissionError::InvalidAgeGroups(_))
        ));
        assert!(matches!(
            AgeGroups::new(vec![AgeGroupBin::new("a", 0), AgeGroupBin::new("b", 0)]),
            Err(TransmissionError::InvalidAgeGroups(_))
        ));
        assert!(matches!(
            AgeGroups::new(vec![AgeGroupBin::new("a", 0), AgeGroupBin::new("a", 10)]),
            Err(TransmissionError::InvalidAgeGroups(_))
        ));
    }

    #[test]
    fn age_groups_deserialize_with_validation() {
        let groups: AgeGroups =
            serde_json::from_str(r#"[{"name": "child", "min_age": 0}, {"name": "adult", "min_age": 18}]"#)
                .unwrap();
        assert_eq!(groups.index_of("adult"), Some(AgeGroupIndex(1)));

        let invalid = serde_json::from_str::<AgeGroups>(r#"[{"name": "adult", "min_age": 18}]"#);
        assert!(invalid.is_err());
    }

    #[test]
    fn weight_table_uses_default_for_unlisted_groups() {
        let groups = child_adult_senior();
        let table = AgeWeightTable::uniform(0.5).with_weight("adult", 2.0);
        assert_eq!(table.resolve(&groups, "weights").unwrap(), vec![0.5, 2.0, 0.5]);
    }

    #[test]
    fn weight_table_rejects_unknown_names_and_negative_weights() {
        let groups = child_adult_senior();
        let unknown = AgeWeightTable::uniform(1.0).with_weight("toddler", 1.0);
        assert!(matches!(
            unknown.resolve(&groups, "weights"),
            Err(TransmissionError::IllegalParameter(_))
        ));
        let negative = AgeWeightTable::uniform(1.0).with_weight("child", -1.0);
        assert!(negative.resolve(&groups, "weights").is_err());
    }

    #[test]
    fn pairwise_weights_resolve_to_a_matrix() {
        let groups = child_adult_senior();
        let matrix = PairwiseAgeWeights::uniform(1.0)
            .with_weight("child", "child", 4.0)
            .with_weight("adult", "senior", 0.0)
            .resolve(&groups, "pairwise")
            .unwrap();
        assert_eq!(matrix.get(AgeGroupIndex(0), AgeGroupIndex(0)), 4.0);
        assert_eq!(matrix.get(AgeGroupIndex(1), AgeGroupIndex(2)), 0.0);
        assert_eq!(matrix.get(AgeGroupIndex(2), AgeGroupIndex(1)), 1.0);
    }

    #[test]
    fn weight_table_from_json() {
        let table: AgeWeightTable =
            serde_json::from_str(r#"{"weights": {"child": 0.25}}"#).unwrap();
        assert_eq!(table.weight("child"), 0.25);
        assert_eq!(table.weight("adult"), 1.0);
    }
}

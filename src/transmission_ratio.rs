//! Per-person transmission ratios.
//!
//! A person's transmission ratio scales how often they make infectious contacts. It combines a
//! per-age-group ratio, normalized once against the population so that its population-weighted
//! mean equals the configured average, with the person's behaviour and whether their infection
//! is symptomatic.

use log::{info, trace};

use crate::age_groups::AgeGroupIndex;
use crate::context::Context;
use crate::error::TransmissionError;
use crate::modifiers::ContextModifiersExt;
use crate::parameters::ContextParametersExt;
use crate::people::{ContextPeopleExt, PersonId};

/// Infectiousness of a symptomatic infection relative to the age group's average infection.
///
/// Chosen so that the expected relative infectiousness over symptomatic and asymptomatic
/// infections is 1.
#[must_use]
pub fn symptomatic_transmissibility(symptomatic_fraction: f64, asymptomatic_infectiousness: f64) -> f64 {
    1.0 / (symptomatic_fraction + (1.0 - symptomatic_fraction) * asymptomatic_infectiousness)
}

/// Relative infectiousness of one infection given whether it is symptomatic.
#[must_use]
pub fn relative_transmissibility(
    symptomatic: bool,
    symptomatic_fraction: f64,
    asymptomatic_infectiousness: f64,
) -> f64 {
    let symptomatic_transmissibility =
        symptomatic_transmissibility(symptomatic_fraction, asymptomatic_infectiousness);
    if symptomatic {
        symptomatic_transmissibility
    } else {
        asymptomatic_infectiousness * symptomatic_transmissibility
    }
}

/// Per-age-group ratio multipliers.
#[derive(Clone, Debug, PartialEq)]
pub struct TransmissionRatios {
    ratios: Vec<f64>,
}

impl TransmissionRatios {
    /// Scales `weights` so that their population-weighted mean, accounting for each age
    /// group's expected symptomatic mix, equals `target_average`:
    ///
    /// `ratio[a] = T · w[a] / (Σ pf·w·sf / Σ pf)`
    ///
    /// where `sf` is the expected relative transmissibility of an infection in the age group.
    /// `population` may hold counts or fractions.
    ///
    /// # Errors
    ///
    /// Returns `TransmissionError::IllegalParameter` if the slices differ in length or the
    /// normalizer is zero (no population, or every populated age group has weight zero).
    pub fn compute(
        weights: &[f64],
        population: &[f64],
        symptomatic_fractions: &[f64],
        asymptomatic_infectiousness: f64,
        target_average: f64,
    ) -> Result<Self, TransmissionError> {
        if weights.len() != population.len() || weights.len() != symptomatic_fractions.len() {
            return Err(TransmissionError::IllegalParameter(
                "transmission weights, population and symptomatic fractions must cover the same age groups"
                    .to_string(),
            ));
        }

        let total_population: f64 = population.iter().sum();
        let weighted: f64 = weights
            .iter()
            .zip(population)
            .zip(symptomatic_fractions)
            .map(|((weight, population), fraction)| {
                let symptomatic = symptomatic_transmissibility(*fraction, asymptomatic_infectiousness);
                let expected = fraction * symptomatic
                    + (1.0 - fraction) * asymptomatic_infectiousness * symptomatic;
                population * weight * expected
            })
            .sum();

        if total_population <= 0.0 || weighted <= 0.0 || !weighted.is_finite() {
            return Err(TransmissionError::IllegalParameter(format!(
                "cannot normalize transmission ratios: population {total_population}, weighted sum {weighted}"
            )));
        }
        let normalizer = weighted / total_population;

        Ok(TransmissionRatios {
            ratios: weights
                .iter()
                .map(|weight| target_average * weight / normalizer)
                .collect(),
        })
    }

    #[must_use]
    pub fn get(&self, age_group: AgeGroupIndex) -> f64 {
        self.ratios[age_group.0]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.ratios
    }
}

crate::define_data_plugin!(TransmissionRatiosPlugin, Option<TransmissionRatios>, None);

pub trait ContextTransmissionRatioExt {
    /// Normalizes the per-age ratios against the current population. Must run after the
    /// population is loaded and before any person becomes infectious.
    ///
    /// # Errors
    ///
    /// Returns `TransmissionError::IllegalParameter` if the ratios cannot be normalized.
    ///
    /// # Panics
    ///
    /// Panics if parameters have not been set.
    fn init_transmission(&mut self) -> Result<(), TransmissionError>;

    /// # Panics
    ///
    /// Panics if `init_transmission` has not run.
    fn get_transmission_ratios(&self) -> &TransmissionRatios;

    /// The person's current transmission ratio. Never negative.
    fn compute_transmission_ratio(&self, person_id: PersonId) -> f64;
}

impl ContextTransmissionRatioExt for Context {
    fn init_transmission(&mut self) -> Result<(), TransmissionError> {
        let parameters = self.get_parameters();
        let tables = self.get_resolved_tables();
        #[allow(clippy::cast_precision_loss)]
        let population: Vec<f64> = self
            .count_by_age_group(parameters.age_groups.len())?
            .into_iter()
            .map(|count| count as f64)
            .collect();

        let ratios = TransmissionRatios::compute(
            &tables.transmission_weights,
            &population,
            &tables.symptomatic_fractions,
            parameters.asymptomatic_infectiousness,
            parameters.average_transmission_ratio,
        )?;
        info!(
            "initialized transmission for {} people; age group ratios {:?}",
            self.get_population(),
            ratios.as_slice()
        );
        *self.get_data_container_mut(TransmissionRatiosPlugin) = Some(ratios);
        Ok(())
    }

    fn get_transmission_ratios(&self) -> &TransmissionRatios {
        self.get_data_container(TransmissionRatiosPlugin)
            .and_then(Option::as_ref)
            .expect("init_transmission must be called before computing transmission ratios")
    }

    fn compute_transmission_ratio(&self, person_id: PersonId) -> f64 {
        let person = self.get_person(person_id);
        let fraction = self.get_resolved_tables().symptomatic_fractions[person.age_group.0];
        let ratio = self.get_transmission_ratios().get(person.age_group)
            * self.relative_activity_level(person_id)
            * relative_transmissibility(
                person.symptomatic,
                fraction,
                self.get_parameters().asymptomatic_infectiousness,
            );
        trace!("transmission ratio of person {person_id} is {ratio}");
        ratio.max(0.0)
    }
}

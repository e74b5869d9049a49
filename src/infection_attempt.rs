//! Deciding whether an infectious contact transmits, and publishing the outcome.
//!
//! Every attempt, including those without a target, produces an `InfectionAttemptRecord`. The
//! record is emitted as an `InfectionAttemptEvent` and kept as the most recent attempt.

use log::{debug, trace};

use crate::context::{Context, SimulationEvent};
use crate::define_rng;
use crate::modifiers::ContextModifiersExt;
use crate::people::{ContextPeopleExt, DiseaseState, PersonId, SettingType};
use crate::random::ContextRandomExt;

define_rng!(InfectionAttemptRng);

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InfectionAttemptRecord {
    pub time: f64,
    pub source: PersonId,
    pub target: Option<PersonId>,
    pub setting: SettingType,
    pub success: bool,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InfectionAttemptEvent {
    pub record: InfectionAttemptRecord,
}

impl SimulationEvent for InfectionAttemptEvent {}

crate::define_data_plugin!(LastInfectionAttemptPlugin, Option<InfectionAttemptRecord>, None);

pub trait ContextInfectionAttemptExt {
    /// Probability that a contact in `setting` infects a susceptible `target`:
    /// `(1 - residual immunity) × behaviour factor × other modifiers`.
    fn infection_acceptance_probability(&self, setting: SettingType, target: PersonId) -> f64;

    /// Decides whether `source` infects `target` in `setting`. A susceptible target that is
    /// infected becomes `Exposed`. The record is published whatever the outcome.
    fn evaluate_infection_attempt(
        &mut self,
        source: PersonId,
        target: Option<PersonId>,
        setting: SettingType,
    ) -> InfectionAttemptRecord;

    fn get_last_infection_attempt(&self) -> Option<InfectionAttemptRecord>;
}

impl ContextInfectionAttemptExt for Context {
    fn infection_acceptance_probability(&self, setting: SettingType, target: PersonId) -> f64 {
        (1.0 - self.residual_immunity(target))
            * self.behavior_infection_probability(setting, target)
            * self.transmission_modifier_product(target)
    }

    fn evaluate_infection_attempt(
        &mut self,
        source: PersonId,
        target: Option<PersonId>,
        setting: SettingType,
    ) -> InfectionAttemptRecord {
        let success = match target {
            Some(target) if self.get_disease_state(target) == DiseaseState::Susceptible => {
                let probability = self.infection_acceptance_probability(setting, target);
                let draw: f64 = self.sample_range(InfectionAttemptRng, 0.0..1.0);
                probability > 0.0 && draw <= probability
            }
            _ => false,
        };

        let record = InfectionAttemptRecord {
            time: self.get_current_time(),
            source,
            target,
            setting,
            success,
        };
        if let (true, Some(target)) = (success, target) {
            debug!("person {source} infected person {target} in {setting} at t={}", record.time);
            self.set_disease_state(target, DiseaseState::Exposed);
        } else {
            trace!("unsuccessful infection attempt {record:?}");
        }

        *self.get_data_container_mut(LastInfectionAttemptPlugin) = Some(record);
        self.emit_event(InfectionAttemptEvent { record });
        record
    }

    fn get_last_infection_attempt(&self) -> Option<InfectionAttemptRecord> {
        self.get_data_container(LastInfectionAttemptPlugin)
            .copied()
            .flatten()
    }
}

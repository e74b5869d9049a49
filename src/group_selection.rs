//! Choosing the setting of an infectious contact.

use log::trace;

use crate::contact_groups::ContextContactGroupsExt;
use crate::context::Context;
use crate::define_rng;
use crate::modifiers::ContextModifiersExt;
use crate::parameters::ContextParametersExt;
use crate::people::{ContextPeopleExt, PersonId, SettingType};
use crate::random::{sample_cumulative, ContextRandomExt};

define_rng!(SettingSelectionRng);

/// Settings a contact of `person_id` can take place in: every group they belong to, then
/// `Global`.
#[must_use]
pub fn setting_candidates(context: &Context, person_id: PersonId) -> Vec<SettingType> {
    let mut candidates = context.get_person_settings(person_id);
    candidates.push(SettingType::Global);
    candidates
}

pub trait ContextGroupSelectionExt {
    /// Draws the setting of the next contact of `person_id`, weighting each candidate by the
    /// configured selection weight for the person's age group, and passes it through the
    /// behaviour provider's substitution. `None` means no contact happens.
    fn select_setting(&self, person_id: PersonId) -> Option<SettingType>;
}

impl ContextGroupSelectionExt for Context {
    fn select_setting(&self, person_id: PersonId) -> Option<SettingType> {
        let age_group = self.get_person_age_group(person_id);
        let tables = self.get_resolved_tables();
        let candidates = setting_candidates(self, person_id);
        let weights: Vec<f64> = candidates
            .iter()
            .map(|setting| tables.selection_weight(*setting, age_group))
            .collect();

        let Some(index) = self.sample(SettingSelectionRng, |rng| sample_cumulative(rng, &weights)) else {
            trace!("person {person_id} has no setting with positive weight");
            return None;
        };
        let selected = candidates[index];

        let substituted = self.substitute_setting(person_id, selected);
        if substituted != Some(selected) {
            trace!("person {person_id}: {selected} contact substituted by {substituted:?}");
        }
        substituted
    }
}

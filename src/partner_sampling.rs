//! Choosing whom an infectious person contacts.
//!
//! Contacts in a household, workplace or school are drawn from the person's group. Global
//! contacts go through two stages: the mobility model picks the destination region, then a
//! partner is drawn from that region's population, optionally biased by age.

use log::trace;

use crate::age_groups::AgeGroupIndex;
use crate::contact_groups::co_members;
use crate::context::Context;
use crate::define_rng;
use crate::geo::ContextGeoExt;
use crate::parameters::ContextParametersExt;
use crate::people::{ContextPeopleExt, PersonId, SettingType};
use crate::random::{sample_cumulative, ContextRandomExt};

define_rng!(GroupPartnerRng);
define_rng!(GlobalRegionRng);
define_rng!(GlobalPartnerRng);
define_rng!(HomeSubstitutionRng);

/// Outcome of a partner draw. `setting` differs from the requested setting when a home
/// contact of someone living alone was re-routed to the community.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PartnerDraw {
    pub setting: SettingType,
    pub target: Option<PersonId>,
}

impl PartnerDraw {
    fn none(setting: SettingType) -> Self {
        PartnerDraw {
            setting,
            target: None,
        }
    }
}

pub trait ContextPartnerSamplingExt {
    /// Draws the partner of a contact of `person_id` in `setting`. Never returns the person
    /// themselves.
    fn sample_partner(&self, person_id: PersonId, setting: SettingType) -> PartnerDraw;

    /// Draws a community partner: a destination region, then a person living there.
    fn sample_global_partner(&self, person_id: PersonId) -> Option<PersonId>;
}

impl ContextPartnerSamplingExt for Context {
    fn sample_partner(&self, person_id: PersonId, setting: SettingType) -> PartnerDraw {
        if setting.is_global() {
            return PartnerDraw {
                setting,
                target: self.sample_global_partner(person_id),
            };
        }

        let Some(members) = co_members(self, person_id, setting) else {
            trace!("person {person_id} has no {setting} group");
            return PartnerDraw::none(setting);
        };

        if setting == SettingType::Home && members.len() == 1 {
            let probability = self
                .get_parameters()
                .transmission
                .lone_home_global_substitution_probability;
            if self.sample_bool(HomeSubstitutionRng, probability) {
                trace!("person {person_id} lives alone; home contact becomes global");
                return PartnerDraw {
                    setting: SettingType::Global,
                    target: self.sample_global_partner(person_id),
                };
            }
            return PartnerDraw::none(setting);
        }

        let target = match self.get_resolved_tables().partner_weights(setting) {
            Some(matrix) => {
                let source_age = self.get_person_age_group(person_id);
                let weights: Vec<f64> = members
                    .iter()
                    .map(|member| {
                        if *member == person_id {
                            0.0
                        } else {
                            matrix.get(source_age, self.get_person_age_group(*member))
                        }
                    })
                    .collect();
                self.sample(GroupPartnerRng, |rng| sample_cumulative(rng, &weights))
                    .map(|index| members[index])
            }
            None => sample_member_excluding(self, members, person_id),
        };
        PartnerDraw { setting, target }
    }

    fn sample_global_partner(&self, person_id: PersonId) -> Option<PersonId> {
        let parameters = self.get_parameters();
        let source_region = self.get_person_region(person_id);
        let target_region =
            if self.sample_bool(GlobalRegionRng, parameters.fraction_of_global_contacts_in_home_region) {
                source_region
            } else {
                let table = self.radiation_flow_table(source_region);
                self.sample(GlobalRegionRng, |rng| table.sample(rng))
            };

        let age_group = match self.get_resolved_tables().partner_weights(SettingType::Global) {
            Some(matrix) => {
                let source_age = self.get_person_age_group(person_id);
                #[allow(clippy::cast_precision_loss)]
                let weights: Vec<f64> = parameters
                    .age_groups
                    .indices()
                    .map(|age| self.count_in(target_region, Some(age)) as f64 * matrix.get(source_age, age))
                    .collect();
                let Some(index) = self.sample(GlobalPartnerRng, |rng| sample_cumulative(rng, &weights)) else {
                    trace!("no age group in region {target_region} is reachable from person {person_id}");
                    return None;
                };
                Some(AgeGroupIndex(index))
            }
            None => None,
        };

        let target = self.sample_person_in(GlobalPartnerRng, target_region, age_group, Some(person_id));
        trace!("person {person_id}: global contact in region {target_region} with {target:?}");
        target
    }
}

/// Uniform draw from `members` other than `source`.
fn sample_member_excluding(context: &Context, members: &[PersonId], source: PersonId) -> Option<PersonId> {
    let source_position = members.iter().position(|member| *member == source);
    let candidates = members.len() - usize::from(source_position.is_some());
    if candidates == 0 {
        return None;
    }
    let mut index = context.sample_range(GroupPartnerRng, 0..candidates);
    if let Some(position) = source_position {
        if index >= position {
            index += 1;
        }
    }
    Some(members[index])
}

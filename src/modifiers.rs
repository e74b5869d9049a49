//! Optional providers that adjust contact behaviour and infection probability.
//!
//! Other subsystems (behavioural interventions, vaccination, immunity tracking) influence
//! transmission by installing one of these providers. Every query has a neutral answer, used
//! when no provider is installed: activity 1.0, settings unchanged, probability factors 1.0
//! and no residual immunity.

use log::debug;

use crate::context::Context;
use crate::people::{PersonId, SettingType};

/// Behavioural adjustments to a person's contacts.
pub trait BehaviorModifier {
    /// Multiplier on how often `person` makes infectious contacts.
    fn relative_activity_level(&self, _context: &Context, _person: PersonId) -> f64 {
        1.0
    }

    /// Replaces the setting chosen for a contact of `person`. `None` means the contact does
    /// not happen.
    fn substitute_setting(
        &self,
        _context: &Context,
        _person: PersonId,
        setting: SettingType,
    ) -> Option<SettingType> {
        Some(setting)
    }

    /// Factor on the probability that a contact in `setting` infects `target`.
    fn infection_probability(&self, _context: &Context, _setting: SettingType, _target: PersonId) -> f64 {
        1.0
    }
}

/// Any other factor on the probability that `target` is infected by a contact, e.g. a
/// vaccine. Every installed modifier is applied.
pub trait TransmissionModifier {
    fn relative_infection_probability(&self, context: &Context, target: PersonId) -> f64;
}

pub trait ImmunityModifier {
    /// Fraction of protection against infection `target` still carries, in `[0, 1]`.
    fn residual_immunity(&self, context: &Context, target: PersonId) -> f64;
}

#[derive(Default)]
struct ModifiersData {
    behavior: Option<Box<dyn BehaviorModifier>>,
    transmission: Vec<Box<dyn TransmissionModifier>>,
    immunity: Option<Box<dyn ImmunityModifier>>,
}

crate::define_data_plugin!(ModifiersPlugin, ModifiersData, ModifiersData::default());

pub trait ContextModifiersExt {
    /// Installs the behaviour provider, replacing any previous one.
    fn set_behavior_modifier(&mut self, modifier: impl BehaviorModifier + 'static);

    fn add_transmission_modifier(&mut self, modifier: impl TransmissionModifier + 'static);

    /// Installs the immunity provider, replacing any previous one.
    fn set_immunity_modifier(&mut self, modifier: impl ImmunityModifier + 'static);

    fn relative_activity_level(&self, person: PersonId) -> f64;

    fn substitute_setting(&self, person: PersonId, setting: SettingType) -> Option<SettingType>;

    fn behavior_infection_probability(&self, setting: SettingType, target: PersonId) -> f64;

    /// Product of every installed `TransmissionModifier` for `target`.
    fn transmission_modifier_product(&self, target: PersonId) -> f64;

    fn residual_immunity(&self, target: PersonId) -> f64;
}

impl ContextModifiersExt for Context {
    fn set_behavior_modifier(&mut self, modifier: impl BehaviorModifier + 'static) {
        debug!("installing behavior modifier");
        self.get_data_container_mut(ModifiersPlugin).behavior = Some(Box::new(modifier));
    }

    fn add_transmission_modifier(&mut self, modifier: impl TransmissionModifier + 'static) {
        debug!("adding transmission modifier");
        self.get_data_container_mut(ModifiersPlugin)
            .transmission
            .push(Box::new(modifier));
    }

    fn set_immunity_modifier(&mut self, modifier: impl ImmunityModifier + 'static) {
        debug!("installing immunity modifier");
        self.get_data_container_mut(ModifiersPlugin).immunity = Some(Box::new(modifier));
    }

    fn relative_activity_level(&self, person: PersonId) -> f64 {
        behavior(self).map_or(1.0, |modifier| modifier.relative_activity_level(self, person))
    }

    fn substitute_setting(&self, person: PersonId, setting: SettingType) -> Option<SettingType> {
        match behavior(self) {
            Some(modifier) => modifier.substitute_setting(self, person, setting),
            None => Some(setting),
        }
    }

    fn behavior_infection_probability(&self, setting: SettingType, target: PersonId) -> f64 {
        behavior(self).map_or(1.0, |modifier| modifier.infection_probability(self, setting, target))
    }

    fn transmission_modifier_product(&self, target: PersonId) -> f64 {
        self.get_data_container(ModifiersPlugin).map_or(1.0, |data| {
            data.transmission
                .iter()
                .map(|modifier| modifier.relative_infection_probability(self, target))
                .product()
        })
    }

    fn residual_immunity(&self, target: PersonId) -> f64 {
        self.get_data_container(ModifiersPlugin)
            .and_then(|data| data.immunity.as_deref())
            .map_or(0.0, |modifier| modifier.residual_immunity(self, target))
    }
}

fn behavior(context: &Context) -> Option<&dyn BehaviorModifier> {
    context
        .get_data_container(ModifiersPlugin)
        .and_then(|data| data.behavior.as_deref())
}

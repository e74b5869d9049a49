//! Contact groups: the households, workplaces and schools people share.
//!
//! Every group has exactly one non-global setting type and a person belongs to at most one
//! group of each type. Memberships are recorded on both the group and the person so either
//! direction is a constant-time lookup.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::TransmissionError;
use crate::geo::RegionId;
use crate::people::{add_person_group, person_groups, ContextPeopleExt, PersonId, SettingType};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(usize);

impl Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct ContactGroup {
    pub setting: SettingType,
    pub members: Vec<PersonId>,
    /// Owning region, used for workplaces.
    pub region: Option<RegionId>,
}

crate::define_data_plugin!(ContactGroupPlugin, Vec<ContactGroup>, Vec::new());

pub trait ContextContactGroupsExt {
    /// Creates an empty group of a non-global setting type.
    ///
    /// # Errors
    ///
    /// Returns `TransmissionError::Population` for `SettingType::Global`, which is not a group.
    fn add_contact_group(
        &mut self,
        setting: SettingType,
        region: Option<RegionId>,
    ) -> Result<GroupId, TransmissionError>;

    /// Adds `person_id` to `group_id`.
    ///
    /// # Errors
    ///
    /// Returns `TransmissionError::Population` if the group does not exist or the person
    /// already belongs to a group of the same setting type.
    fn add_group_member(&mut self, group_id: GroupId, person_id: PersonId) -> Result<(), TransmissionError>;

    /// # Panics
    ///
    /// Panics if the group does not exist.
    fn get_contact_group(&self, group_id: GroupId) -> &ContactGroup;

    fn get_group_members(&self, group_id: GroupId) -> &[PersonId] {
        &self.get_contact_group(group_id).members
    }

    /// The person's group of the given setting type, if any.
    fn get_person_group(&self, person_id: PersonId, setting: SettingType) -> Option<GroupId>;

    /// Every non-global setting the person belongs to, in the order they joined.
    fn get_person_settings(&self, person_id: PersonId) -> Vec<SettingType>;

    fn get_contact_group_count(&self) -> usize;
}

impl ContextContactGroupsExt for Context {
    fn add_contact_group(
        &mut self,
        setting: SettingType,
        region: Option<RegionId>,
    ) -> Result<GroupId, TransmissionError> {
        if setting.is_global() {
            return Err(TransmissionError::Population(
                "the global setting cannot be used as a contact group".to_string(),
            ));
        }
        let groups = self.get_data_container_mut(ContactGroupPlugin);
        groups.push(ContactGroup {
            setting,
            members: Vec::new(),
            region,
        });
        Ok(GroupId(groups.len() - 1))
    }

    fn add_group_member(&mut self, group_id: GroupId, person_id: PersonId) -> Result<(), TransmissionError> {
        let setting = self
            .get_data_container(ContactGroupPlugin)
            .and_then(|groups| groups.get(group_id.0))
            .map(|group| group.setting)
            .ok_or_else(|| TransmissionError::Population(format!("group {group_id} does not exist")))?;

        if let Some(existing) = self.get_person_group(person_id, setting) {
            return Err(TransmissionError::Population(format!(
                "person {person_id} already belongs to {setting} group {existing}"
            )));
        }

        self.get_data_container_mut(ContactGroupPlugin)[group_id.0]
            .members
            .push(person_id);
        add_person_group(self, person_id, setting, group_id);
        Ok(())
    }

    fn get_contact_group(&self, group_id: GroupId) -> &ContactGroup {
        self.get_data_container(ContactGroupPlugin)
            .and_then(|groups| groups.get(group_id.0))
            .unwrap_or_else(|| panic!("Group {group_id} does not exist"))
    }

    fn get_person_group(&self, person_id: PersonId, setting: SettingType) -> Option<GroupId> {
        person_groups(self, person_id)
            .iter()
            .find(|(group_setting, _)| *group_setting == setting)
            .map(|(_, group_id)| *group_id)
    }

    fn get_person_settings(&self, person_id: PersonId) -> Vec<SettingType> {
        person_groups(self, person_id)
            .iter()
            .map(|(setting, _)| *setting)
            .collect()
    }

    fn get_contact_group_count(&self) -> usize {
        self.get_data_container(ContactGroupPlugin)
            .map_or(0, Vec::len)
    }
}

/// Helper for callers holding only a person: the members of their group of `setting`.
pub(crate) fn co_members(context: &Context, person_id: PersonId, setting: SettingType) -> Option<&[PersonId]> {
    context
        .get_person_group(person_id, setting)
        .map(|group_id| context.get_group_members(group_id))
}

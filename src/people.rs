//! People and the population index.
//!
//! A person carries exactly what the contact model needs: home region, age group, whether the
//! infection will become symptomatic, disease state, and one contact group per non-global
//! setting. People are never removed.
//!
//! The population index answers "how many people are in region X (and age group Y)" and "draw
//! one of them uniformly". Each (region, age group) pool is built lazily on its first query
//! and kept in step with later additions and region changes.

use std::cell::RefCell;
use std::fmt::{self, Display};

use log::trace;
use serde::{Deserialize, Serialize};
use strum::Display as StrumDisplay;

use crate::age_groups::AgeGroupIndex;
use crate::context::{Context, SimulationEvent};
use crate::contact_groups::GroupId;
use crate::geo::RegionId;
use crate::error::TransmissionError;
use crate::hashing::IndexSet;
use crate::parameters::ContextParametersExt;
use crate::rand::Rng;
use crate::random::{sample_uniform_excluding, ContextRandomExt, RngId};
use crate::{HashMap, HashMapExt};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonId(usize);

impl PersonId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The context in which a contact takes place.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    StrumDisplay,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SettingType {
    Home,
    Work,
    School,
    /// The community at large, reached through the mobility model.
    Global,
}

impl SettingType {
    #[must_use]
    pub fn is_global(self) -> bool {
        self == SettingType::Global
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiseaseState {
    Susceptible,
    /// Received an infectious contact; what happens next is up to disease progression.
    Exposed,
    Infectious,
    Recovered,
}

/// Emitted whenever `set_disease_state` changes a person's state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DiseaseStateChangeEvent {
    pub person_id: PersonId,
    pub previous: DiseaseState,
    pub current: DiseaseState,
}

impl SimulationEvent for DiseaseStateChangeEvent {}

#[derive(Clone, Debug)]
pub struct PersonRecord {
    pub region: RegionId,
    pub age_group: AgeGroupIndex,
    pub symptomatic: bool,
    pub disease_state: DiseaseState,
    pub(crate) groups: Vec<(SettingType, GroupId)>,
}

/// Key of one pool in the population index. `age_group: None` pools every age in the region.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct PopulationKey {
    region: RegionId,
    age_group: Option<AgeGroupIndex>,
}

impl PopulationKey {
    fn matches(&self, person: &PersonRecord) -> bool {
        person.region == self.region && self.age_group.is_none_or(|age| age == person.age_group)
    }

    fn keys_for(person: &PersonRecord) -> [PopulationKey; 2] {
        [
            PopulationKey {
                region: person.region,
                age_group: None,
            },
            PopulationKey {
                region: person.region,
                age_group: Some(person.age_group),
            },
        ]
    }
}

struct PeopleData {
    people: Vec<PersonRecord>,
    index: RefCell<HashMap<PopulationKey, IndexSet<PersonId>>>,
}

impl PeopleData {
    fn person(&self, person_id: PersonId) -> &PersonRecord {
        self.people
            .get(person_id.0)
            .unwrap_or_else(|| panic!("Person {person_id} does not exist"))
    }

    fn person_mut(&mut self, person_id: PersonId) -> &mut PersonRecord {
        self.people
            .get_mut(person_id.0)
            .unwrap_or_else(|| panic!("Person {person_id} does not exist"))
    }

    /// Runs `f` on the pool for `key`, building the pool from a full scan on first use.
    fn with_pool<T>(&self, key: PopulationKey, f: impl FnOnce(&IndexSet<PersonId>) -> T) -> T {
        let mut index = self.index.borrow_mut();
        let pool = index.entry(key).or_insert_with(|| {
            trace!("indexing population pool {key:?}");
            self.people
                .iter()
                .enumerate()
                .filter(|(_, person)| key.matches(person))
                .map(|(i, _)| PersonId(i))
                .collect()
        });
        f(pool)
    }

    fn add_to_built_pools(&mut self, person_id: PersonId) {
        let keys = PopulationKey::keys_for(self.person(person_id));
        let index = self.index.get_mut();
        for key in keys {
            if let Some(pool) = index.get_mut(&key) {
                pool.insert(person_id);
            }
        }
    }

    fn remove_from_built_pools(&mut self, person_id: PersonId) {
        let keys = PopulationKey::keys_for(self.person(person_id));
        let index = self.index.get_mut();
        for key in keys {
            if let Some(pool) = index.get_mut(&key) {
                pool.swap_remove(&person_id);
            }
        }
    }
}

crate::define_data_plugin!(
    PeoplePlugin,
    PeopleData,
    PeopleData {
        people: Vec::new(),
        index: RefCell::new(HashMap::new()),
    }
);

pub trait ContextPeopleExt {
    /// Adds a susceptible person with no contact groups.
    ///
    /// # Panics
    ///
    /// Panics if parameters are installed and `age_group` is not one of their age groups.
    fn add_person(&mut self, region: RegionId, age_group: AgeGroupIndex, symptomatic: bool) -> PersonId;

    fn get_population(&self) -> usize;

    /// Iterates over every person id in creation order.
    fn people(&self) -> impl Iterator<Item = PersonId>;

    /// # Panics
    ///
    /// Panics if the person does not exist. The same holds for every accessor taking a
    /// `PersonId`.
    fn get_person(&self, person_id: PersonId) -> &PersonRecord;

    fn get_person_region(&self, person_id: PersonId) -> RegionId {
        self.get_person(person_id).region
    }

    fn get_person_age_group(&self, person_id: PersonId) -> AgeGroupIndex {
        self.get_person(person_id).age_group
    }

    fn is_symptomatic(&self, person_id: PersonId) -> bool {
        self.get_person(person_id).symptomatic
    }

    fn get_disease_state(&self, person_id: PersonId) -> DiseaseState {
        self.get_person(person_id).disease_state
    }

    /// Changes the disease state and emits a `DiseaseStateChangeEvent` if it differs.
    fn set_disease_state(&mut self, person_id: PersonId, state: DiseaseState);

    /// Moves a person to another region, keeping the population index current.
    fn set_person_region(&mut self, person_id: PersonId, region: RegionId);

    /// Number of people in `region`, restricted to `age_group` when given.
    fn count_in(&self, region: RegionId, age_group: Option<AgeGroupIndex>) -> usize;

    /// Number of people in each age group, indexed by `AgeGroupIndex`.
    ///
    /// # Errors
    ///
    /// Returns `TransmissionError::Population` if a person's age group is not below
    /// `age_group_count`.
    fn count_by_age_group(&self, age_group_count: usize) -> Result<Vec<usize>, TransmissionError>;

    /// Draws a person uniformly from `region` (and `age_group` when given), never returning
    /// `exclude`. Returns `None` if the pool has no other member.
    fn sample_person_in<R: RngId>(
        &self,
        rng_id: R,
        region: RegionId,
        age_group: Option<AgeGroupIndex>,
        exclude: Option<PersonId>,
    ) -> Option<PersonId>
    where
        R::RngType: Rng;
}

impl ContextPeopleExt for Context {
    fn add_person(&mut self, region: RegionId, age_group: AgeGroupIndex, symptomatic: bool) -> PersonId {
        if let Some(parameters) = self.try_get_parameters() {
            let count = parameters.age_groups.len();
            assert!(
                age_group.0 < count,
                "Age group {} is out of range; {count} age groups are configured",
                age_group.0
            );
        }
        let data = self.get_data_container_mut(PeoplePlugin);
        let person_id = PersonId(data.people.len());
        data.people.push(PersonRecord {
            region,
            age_group,
            symptomatic,
            disease_state: DiseaseState::Susceptible,
            groups: Vec::new(),
        });
        data.add_to_built_pools(person_id);
        person_id
    }

    fn get_population(&self) -> usize {
        self.get_data_container(PeoplePlugin)
            .map_or(0, |data| data.people.len())
    }

    fn people(&self) -> impl Iterator<Item = PersonId> {
        (0..self.get_population()).map(PersonId)
    }

    fn get_person(&self, person_id: PersonId) -> &PersonRecord {
        self.get_data_container(PeoplePlugin)
            .unwrap_or_else(|| panic!("Person {person_id} does not exist"))
            .person(person_id)
    }

    fn set_disease_state(&mut self, person_id: PersonId, state: DiseaseState) {
        let person = self.get_data_container_mut(PeoplePlugin).person_mut(person_id);
        let previous = person.disease_state;
        if previous == state {
            return;
        }
        person.disease_state = state;
        trace!("person {person_id}: {previous:?} -> {state:?}");
        self.emit_event(DiseaseStateChangeEvent {
            person_id,
            previous,
            current: state,
        });
    }

    fn set_person_region(&mut self, person_id: PersonId, region: RegionId) {
        let data = self.get_data_container_mut(PeoplePlugin);
        if data.person(person_id).region == region {
            return;
        }
        data.remove_from_built_pools(person_id);
        data.person_mut(person_id).region = region;
        data.add_to_built_pools(person_id);
    }

    fn count_in(&self, region: RegionId, age_group: Option<AgeGroupIndex>) -> usize {
        self.get_data_container(PeoplePlugin).map_or(0, |data| {
            data.with_pool(PopulationKey { region, age_group }, IndexSet::len)
        })
    }

    fn count_by_age_group(&self, age_group_count: usize) -> Result<Vec<usize>, TransmissionError> {
        let mut counts = vec![0; age_group_count];
        if let Some(data) = self.get_data_container(PeoplePlugin) {
            for (index, person) in data.people.iter().enumerate() {
                let Some(count) = counts.get_mut(person.age_group.0) else {
                    return Err(TransmissionError::Population(format!(
                        "person {index} has age group {} but only {age_group_count} are configured",
                        person.age_group.0
                    )));
                };
                *count += 1;
            }
        }
        Ok(counts)
    }

    fn sample_person_in<R: RngId>(
        &self,
        rng_id: R,
        region: RegionId,
        age_group: Option<AgeGroupIndex>,
        exclude: Option<PersonId>,
    ) -> Option<PersonId>
    where
        R::RngType: Rng,
    {
        let data = self.get_data_container(PeoplePlugin)?;
        data.with_pool(PopulationKey { region, age_group }, |pool| {
            self.sample(rng_id, |rng| {
                sample_uniform_excluding(rng, pool, exclude.as_ref())
            })
        })
    }
}

/// Crate-internal access to contact group memberships, which `contact_groups` maintains.
pub(crate) fn person_groups(context: &Context, person_id: PersonId) -> &[(SettingType, GroupId)] {
    &context.get_person(person_id).groups
}

pub(crate) fn add_person_group(
    context: &mut Context,
    person_id: PersonId,
    setting: SettingType,
    group_id: GroupId,
) {
    context
        .get_data_container_mut(PeoplePlugin)
        .person_mut(person_id)
        .groups
        .push((setting, group_id));
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::define_rng;
    use crate::parameters::Parameters;

    define_rng!(PeopleTestRng);

    const NORTH: RegionId = RegionId(1);
    const SOUTH: RegionId = RegionId(2);
    const CHILD: AgeGroupIndex = AgeGroupIndex(0);
    const ADULT: AgeGroupIndex = AgeGroupIndex(1);

    #[test]
    fn add_people_and_read_them_back() {
        let mut context = Context::new();
        assert_eq!(context.get_population(), 0);
        let p0 = context.add_person(NORTH, CHILD, true);
        let p1 = context.add_person(SOUTH, ADULT, false);
        assert_eq!(context.get_population(), 2);
        assert_eq!(context.people().collect::<Vec<_>>(), vec![p0, p1]);
        assert_eq!(context.get_person_region(p1), SOUTH);
        assert_eq!(context.get_person_age_group(p0), CHILD);
        assert!(context.is_symptomatic(p0));
        assert_eq!(context.get_disease_state(p1), DiseaseState::Susceptible);
        assert_eq!(context.count_by_age_group(2).unwrap(), vec![1, 1]);
        assert!(matches!(
            context.count_by_age_group(1),
            Err(TransmissionError::Population(_))
        ));
    }

    #[test]
    #[should_panic(expected = "Age group 3 is out of range; 1 age groups are configured")]
    fn age_group_outside_the_configured_partition_panics() {
        let mut context = Context::new();
        context.set_parameters(Parameters::default()).unwrap();
        context.add_person(NORTH, AgeGroupIndex(3), true);
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn unknown_person_panics() {
        let mut context = Context::new();
        let person = context.add_person(NORTH, CHILD, true);
        let other = Context::new();
        other.get_disease_state(person);
    }

    #[test]
    fn counts_follow_additions_and_moves() {
        let mut context = Context::new();
        let p0 = context.add_person(NORTH, CHILD, true);
        context.add_person(NORTH, ADULT, true);
        assert_eq!(context.count_in(NORTH, None), 2);
        assert_eq!(context.count_in(NORTH, Some(ADULT)), 1);
        assert_eq!(context.count_in(SOUTH, None), 0);

        // Pools are built now; later changes must be applied incrementally.
        context.add_person(NORTH, ADULT, false);
        context.set_person_region(p0, SOUTH);
        assert_eq!(context.count_in(NORTH, None), 2);
        assert_eq!(context.count_in(NORTH, Some(CHILD)), 0);
        assert_eq!(context.count_in(NORTH, Some(ADULT)), 2);
        assert_eq!(context.count_in(SOUTH, Some(CHILD)), 1);
    }

    #[test]
    fn sampling_excludes_the_source() {
        let mut context = Context::new();
        context.init_random(8);
        let source = context.add_person(NORTH, ADULT, true);
        assert_eq!(
            context.sample_person_in(PeopleTestRng, NORTH, Some(ADULT), Some(source)),
            None
        );
        let other = context.add_person(NORTH, ADULT, true);
        for _ in 0..20 {
            assert_eq!(
                context.sample_person_in(PeopleTestRng, NORTH, Some(ADULT), Some(source)),
                Some(other)
            );
        }
        assert_eq!(
            context.sample_person_in(PeopleTestRng, SOUTH, None, Some(source)),
            None
        );
    }

    #[test]
    fn disease_state_changes_emit_events() {
        let mut context = Context::new();
        let person = context.add_person(NORTH, ADULT, true);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        context.subscribe_to_event(move |_, event: DiseaseStateChangeEvent| {
            seen_clone.borrow_mut().push((event.previous, event.current));
        });
        context.set_disease_state(person, DiseaseState::Infectious);
        // Unchanged state, no event.
        context.set_disease_state(person, DiseaseState::Infectious);
        context.execute();
        assert_eq!(
            *seen.borrow(),
            vec![(DiseaseState::Susceptible, DiseaseState::Infectious)]
        );
    }

    #[test]
    fn setting_type_names() {
        assert_eq!(SettingType::Home.to_string(), "home");
        assert_eq!(
            serde_json::from_str::<SettingType>("\"global\"").unwrap(),
            SettingType::Global
        );
        assert!(SettingType::Global.is_global());
        assert!(!SettingType::School.is_global());
    }
}

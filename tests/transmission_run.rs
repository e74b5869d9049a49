use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use ixa_transmission::prelude::*;

const PARAMETERS: &str = "tests/data/parameters.json";
const REGIONS: &str = "tests/data/regions.csv";
const HOUSEHOLDS_PER_REGION: usize = 40;
const AGES: [u32; 4] = [35, 8, 40, 70];

/// Five regions of 40 households each, with one workplace and one school per region.
fn build_population(context: &mut Context) -> Vec<PersonId> {
    let mut people = Vec::new();
    for region in 1..=5 {
        let region = RegionId(region);
        let work = context
            .add_contact_group(SettingType::Work, Some(region))
            .unwrap();
        let school = context.add_contact_group(SettingType::School, None).unwrap();
        for household in 0..HOUSEHOLDS_PER_REGION {
            let home = context.add_contact_group(SettingType::Home, None).unwrap();
            for age in AGES.iter().take(1 + household % AGES.len()) {
                let age_group = context.age_group_for_age(*age);
                let person = context.add_person(region, age_group, people.len() % 3 != 0);
                context.add_group_member(home, person).unwrap();
                match *age {
                    0..18 => context.add_group_member(school, person).unwrap(),
                    18..65 => context.add_group_member(work, person).unwrap(),
                    _ => {}
                }
                people.push(person);
            }
        }
    }
    people
}

/// Exposed people become infectious two days later and recover five days after that.
fn add_disease_progression(context: &mut Context) {
    context.subscribe_to_event(|context, event: DiseaseStateChangeEvent| {
        if event.current != DiseaseState::Exposed {
            return;
        }
        let person = event.person_id;
        let now = context.get_current_time();
        context.add_plan(now + 2.0, move |context| {
            context.on_became_infectious(person);
        });
        context.add_plan(now + 7.0, move |context| {
            context.on_recovered(person);
        });
    });
}

fn setup(seed: u64) -> (Context, Vec<PersonId>) {
    let mut context = Context::new();
    context
        .load_parameters_from_json(Path::new(PARAMETERS))
        .unwrap();
    context.init_random(seed);
    assert_eq!(context.load_regions_from_csv(Path::new(REGIONS)).unwrap(), 5);
    let people = build_population(&mut context);
    context.init_transmission().unwrap();
    add_disease_progression(&mut context);
    (context, people)
}

fn record_attempts(context: &mut Context) -> Rc<RefCell<Vec<InfectionAttemptRecord>>> {
    let records = Rc::new(RefCell::new(Vec::new()));
    let records_clone = Rc::clone(&records);
    context.subscribe_to_event(move |_, event: InfectionAttemptEvent| {
        records_clone.borrow_mut().push(event.record);
    });
    records
}

fn run(context: &mut Context, index_cases: &[PersonId]) {
    for person in index_cases {
        context.on_became_infectious(*person);
    }
    let max_time = context.get_parameters().max_time;
    context.add_plan_with_phase(max_time, Context::shutdown, ExecutionPhase::Last);
    context.execute();
}

fn simulate(seed: u64) -> Vec<InfectionAttemptRecord> {
    let (mut context, people) = setup(seed);
    let records = record_attempts(&mut context);
    run(&mut context, &people[..3]);
    let records = records.borrow().clone();
    records
}

#[test]
fn population_matches_the_fixture() {
    let (context, people) = setup(1);
    assert_eq!(people.len(), 5 * 10 * (1 + 2 + 3 + 4));
    assert_eq!(context.get_population(), people.len());
    assert_eq!(context.get_region_count(), 5);
    assert_eq!(context.count_in(RegionId(3), None), 100);
    assert_eq!(context.count_in(RegionId(3), Some(AgeGroupIndex(2))), 10);
    let ratios = context.get_transmission_ratios().as_slice();
    assert_eq!(ratios.len(), 3);
    assert!(ratios[0] > ratios[1] && ratios[1] > ratios[2]);
}

#[test]
fn runs_are_reproducible_for_a_seed() {
    let first = simulate(8);
    assert!(!first.is_empty());
    assert_eq!(first, simulate(8));
    assert_ne!(first, simulate(9));
}

#[test]
fn attempts_are_well_formed() {
    let (mut context, people) = setup(17);
    let records = record_attempts(&mut context);
    run(&mut context, &people[..3]);

    let records = records.borrow();
    let max_time = context.get_parameters().max_time;
    assert!(records.iter().any(|record| record.success));
    for record in records.iter() {
        assert_ne!(record.target, Some(record.source));
        assert!(record.time <= max_time);
        if record.success {
            assert!(record.target.is_some());
        }
    }
    assert_eq!(context.get_last_infection_attempt(), records.last().copied());

    let statistics = context.get_contact_statistics();
    assert_eq!(statistics.infection_attempts, records.len());
    assert_eq!(
        statistics.infectious_contacts,
        records.iter().filter(|record| record.success).count()
    );
    assert_eq!(
        statistics.attempts_without_target,
        records.iter().filter(|record| record.target.is_none()).count()
    );
}

#[test]
fn epidemic_spreads_and_plans_follow_disease_state() {
    let (mut context, people) = setup(3);
    run(&mut context, &people[..3]);

    let statistics = context.get_contact_statistics();
    assert!(statistics.infectious_contacts > 3, "{statistics:?}");
    for person in &people {
        match context.get_disease_state(*person) {
            DiseaseState::Infectious => {}
            _ => assert_eq!(context.peek_contact_plan(*person), None),
        }
    }
    let recovered = people
        .iter()
        .filter(|person| context.get_disease_state(**person) == DiseaseState::Recovered)
        .count();
    assert!(recovered >= 3);
}

struct Lockdown(Rc<Cell<f64>>);

impl BehaviorModifier for Lockdown {
    fn relative_activity_level(&self, _: &Context, _: PersonId) -> f64 {
        self.0.get()
    }
}

#[test]
fn lockdown_is_thinned_and_reopening_is_rescheduled() {
    let (mut context, people) = setup(5);
    let activity = Rc::new(Cell::new(1.0));
    context.set_behavior_modifier(Lockdown(Rc::clone(&activity)));

    // Decreases need no notification; thinning corrects them.
    let lockdown = Rc::clone(&activity);
    context.add_plan(10.0, move |_| lockdown.set(0.3));
    let reopening = Rc::clone(&activity);
    let everyone = people.clone();
    context.add_plan(20.0, move |context| {
        reopening.set(1.0);
        for person in &everyone {
            context.on_behavior_changed(*person);
        }
    });
    run(&mut context, &people[..3]);

    let statistics = context.get_contact_statistics();
    assert!(statistics.thinning_rejections > 0, "{statistics:?}");
    assert_eq!(context.get_current_time(), context.get_parameters().max_time);
}

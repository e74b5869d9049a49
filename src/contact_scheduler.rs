//! Scheduling of infectious contacts.
//!
//! Each infectious person has at most one pending contact plan. A plan remembers the
//! transmission ratio `R` it was drawn with; the delay until it fires is exponential with rate
//! `infectious_contact_rate · R`. Ratios can change between scheduling and execution:
//!
//! - an increase is handled immediately by `on_behavior_changed`, which cancels the plan and
//!   draws a new one at the higher ratio;
//! - a decrease is handled when the plan fires: the contact goes ahead with probability
//!   `R″ / R`, where `R″` is the ratio at execution time (thinning).
//!
//! Together these sample the time-varying contact process exactly. Finding `R″ > R` at
//! execution means an increase was never reported, which is a fatal error.
//!
//! The four entry points are the only way other subsystems drive this module:
//! `on_became_infectious`, `on_behavior_changed`, `on_contact_attempt_due` (called by the
//! scheduled plan itself) and `on_recovered`.

use log::{debug, trace};
use rand_distr::Exp;

use crate::context::Context;
use crate::define_rng;
use crate::group_selection::ContextGroupSelectionExt;
use crate::infection_attempt::ContextInfectionAttemptExt;
use crate::parameters::ContextParametersExt;
use crate::partner_sampling::ContextPartnerSamplingExt;
use crate::people::{ContextPeopleExt, DiseaseState, PersonId};
use crate::plan::PlanId;
use crate::random::ContextRandomExt;
use crate::transmission_ratio::ContextTransmissionRatioExt;
use crate::{HashMap, HashMapExt};

define_rng!(ContactTimingRng);
define_rng!(ThinningRng);

/// A scheduled contact attempt and the transmission ratio it was drawn with.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InfectiousContactPlan {
    pub source: PersonId,
    pub ratio: f64,
}

/// Running counts of what happened to contact attempts. Every due attempt of an infectious
/// person ends in exactly one of `thinning_rejections`, `dropped_attempts` or
/// `infection_attempts`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactStatistics {
    pub attempts_due: usize,
    pub thinning_rejections: usize,
    /// No setting was chosen, or the behaviour provider cancelled the contact.
    pub dropped_attempts: usize,
    /// Evaluated attempts for which no partner was found.
    pub attempts_without_target: usize,
    pub infection_attempts: usize,
    pub infectious_contacts: usize,
}

struct PendingPlan {
    plan: InfectiousContactPlan,
    plan_id: PlanId,
    time: f64,
}

struct ContactSchedulerData {
    pending: HashMap<PersonId, PendingPlan>,
    statistics: ContactStatistics,
}

crate::define_data_plugin!(
    ContactSchedulerPlugin,
    ContactSchedulerData,
    ContactSchedulerData {
        pending: HashMap::new(),
        statistics: ContactStatistics::default(),
    }
);

pub trait ContextContactSchedulerExt {
    /// Schedules `plan` for `person_id` at `time`.
    ///
    /// # Panics
    ///
    /// Panics if the person already has a pending plan.
    fn schedule_contact_plan(&mut self, person_id: PersonId, time: f64, plan: InfectiousContactPlan);

    /// Cancels the person's pending plan, returning it if there was one.
    fn cancel_contact_plan(&mut self, person_id: PersonId) -> Option<InfectiousContactPlan>;

    fn peek_contact_plan(&self, person_id: PersonId) -> Option<InfectiousContactPlan>;

    /// Time at which the person's pending plan fires.
    fn next_contact_time(&self, person_id: PersonId) -> Option<f64>;

    /// Marks the person infectious and schedules their first contact attempt. A person whose
    /// ratio is zero gets no plan until `on_behavior_changed` finds a positive ratio.
    ///
    /// # Panics
    ///
    /// Panics if the person already has a pending plan.
    fn on_became_infectious(&mut self, person_id: PersonId);

    /// Re-evaluates an infectious person's ratio after a behavioural change and reschedules
    /// their next attempt if it went up.
    fn on_behavior_changed(&mut self, person_id: PersonId);

    /// Runs a due contact attempt and schedules the next one.
    ///
    /// # Panics
    ///
    /// Panics if `plan` is not the person's pending plan, or if the person's ratio is higher
    /// than the ratio `plan` was drawn with.
    fn on_contact_attempt_due(&mut self, person_id: PersonId, plan: InfectiousContactPlan);

    /// Marks the person recovered and cancels any pending plan.
    fn on_recovered(&mut self, person_id: PersonId);

    fn get_contact_statistics(&self) -> ContactStatistics;
}

fn statistics_mut(context: &mut Context) -> &mut ContactStatistics {
    &mut context.get_data_container_mut(ContactSchedulerPlugin).statistics
}

/// Draws the delay to the next attempt at `ratio` and schedules it.
fn schedule_from_now(context: &mut Context, person_id: PersonId, ratio: f64) {
    let rate = context.get_parameters().infectious_contact_rate * ratio;
    let distribution = match Exp::new(rate) {
        Ok(distribution) => distribution,
        Err(e) => panic!("invalid contact rate {rate} for person {person_id}: {e}"),
    };
    let delay = context.sample_distr(ContactTimingRng, distribution);
    let time = context.get_current_time() + delay;
    context.schedule_contact_plan(
        person_id,
        time,
        InfectiousContactPlan {
            source: person_id,
            ratio,
        },
    );
}

/// Chooses a setting and partner and evaluates the infection attempt.
fn attempt_contact(context: &mut Context, person_id: PersonId) {
    let Some(setting) = context.select_setting(person_id) else {
        statistics_mut(context).dropped_attempts += 1;
        return;
    };
    let draw = context.sample_partner(person_id, setting);
    let record = context.evaluate_infection_attempt(person_id, draw.target, draw.setting);

    let statistics = statistics_mut(context);
    statistics.infection_attempts += 1;
    if record.target.is_none() {
        statistics.attempts_without_target += 1;
    }
    if record.success {
        statistics.infectious_contacts += 1;
    }
}

impl ContextContactSchedulerExt for Context {
    fn schedule_contact_plan(&mut self, person_id: PersonId, time: f64, plan: InfectiousContactPlan) {
        assert!(
            self.peek_contact_plan(person_id).is_none(),
            "Person {person_id} already has a pending contact plan"
        );
        let plan_id = self.add_plan(time, move |context| {
            context.on_contact_attempt_due(person_id, plan);
        });
        trace!("person {person_id}: contact attempt at t={time} with ratio {}", plan.ratio);
        self.get_data_container_mut(ContactSchedulerPlugin)
            .pending
            .insert(person_id, PendingPlan { plan, plan_id, time });
    }

    fn cancel_contact_plan(&mut self, person_id: PersonId) -> Option<InfectiousContactPlan> {
        let pending = self
            .get_data_container_mut(ContactSchedulerPlugin)
            .pending
            .remove(&person_id)?;
        if self.is_plan_pending(&pending.plan_id) {
            self.cancel_plan(&pending.plan_id);
        }
        Some(pending.plan)
    }

    fn peek_contact_plan(&self, person_id: PersonId) -> Option<InfectiousContactPlan> {
        self.get_data_container(ContactSchedulerPlugin)
            .and_then(|data| data.pending.get(&person_id))
            .map(|pending| pending.plan)
    }

    fn next_contact_time(&self, person_id: PersonId) -> Option<f64> {
        self.get_data_container(ContactSchedulerPlugin)
            .and_then(|data| data.pending.get(&person_id))
            .map(|pending| pending.time)
    }

    fn on_became_infectious(&mut self, person_id: PersonId) {
        assert!(
            self.peek_contact_plan(person_id).is_none(),
            "Person {person_id} became infectious while a contact plan is pending"
        );
        self.set_disease_state(person_id, DiseaseState::Infectious);
        let ratio = self.compute_transmission_ratio(person_id);
        if ratio > 0.0 {
            schedule_from_now(self, person_id, ratio);
        } else {
            debug!("person {person_id} is infectious with transmission ratio 0");
        }
    }

    fn on_behavior_changed(&mut self, person_id: PersonId) {
        if self.get_disease_state(person_id) != DiseaseState::Infectious {
            return;
        }
        let ratio = self.compute_transmission_ratio(person_id);
        match self.peek_contact_plan(person_id) {
            Some(plan) if ratio > plan.ratio => {
                trace!(
                    "person {person_id}: ratio rose from {} to {ratio}; rescheduling",
                    plan.ratio
                );
                self.cancel_contact_plan(person_id);
                schedule_from_now(self, person_id, ratio);
            }
            // Decreases are corrected by thinning when the plan fires.
            Some(_) => {}
            None if ratio > 0.0 => schedule_from_now(self, person_id, ratio),
            None => {}
        }
    }

    fn on_contact_attempt_due(&mut self, person_id: PersonId, plan: InfectiousContactPlan) {
        assert_eq!(
            self.peek_contact_plan(person_id),
            Some(plan),
            "Contact attempt for person {person_id} does not match their pending plan"
        );
        self.cancel_contact_plan(person_id);
        statistics_mut(self).attempts_due += 1;

        if self.get_disease_state(person_id) != DiseaseState::Infectious {
            debug!("person {person_id} is no longer infectious; dropping their contact plan");
            return;
        }

        let current_ratio = self.compute_transmission_ratio(person_id);
        assert!(
            current_ratio <= plan.ratio,
            "Transmission ratio of person {person_id} rose from {} to {current_ratio} without a reschedule",
            plan.ratio
        );

        if self.sample_bool(ThinningRng, current_ratio / plan.ratio) {
            attempt_contact(self, person_id);
        } else {
            trace!(
                "person {person_id}: attempt thinned (ratio {current_ratio} of {})",
                plan.ratio
            );
            statistics_mut(self).thinning_rejections += 1;
        }

        if current_ratio > 0.0 && self.get_disease_state(person_id) == DiseaseState::Infectious {
            schedule_from_now(self, person_id, current_ratio);
        }
    }

    fn on_recovered(&mut self, person_id: PersonId) {
        self.set_disease_state(person_id, DiseaseState::Recovered);
        if self.cancel_contact_plan(person_id).is_some() {
            trace!("person {person_id} recovered; contact plan cancelled");
        }
    }

    fn get_contact_statistics(&self) -> ContactStatistics {
        self.get_data_container(ContactSchedulerPlugin)
            .map(|data| data.statistics)
            .unwrap_or_default()
    }
}

//! The infectious-contact core of an agent-based epidemic simulation.
//!
//! For every infectious person this crate decides *when* their next contact happens, *where*
//! it happens (home, work, school or the wider community), *whom* it involves and *whether*
//! it transmits. Everything else in a disease model (progression, hospitalization,
//! vaccination, reporting) reacts to the events produced here.
//!
//! The central object is the `Context`, which keeps simulated time, runs scheduled plans and
//! holds module data. Each piece of the contact model is an extension trait on `Context`:
//! * `ContextTransmissionRatioExt`: per-person transmission ratios, normalized against the
//!   population
//! * `ContextContactSchedulerExt`: the contact plan of each infectious person, sampled as a
//!   time-varying Poisson process by thinning
//! * `ContextGroupSelectionExt`: the setting of each contact
//! * `ContextPartnerSamplingExt`: the contact partner, using a radiation mobility model for
//!   community contacts
//! * `ContextInfectionAttemptExt`: the outcome of each contact
//!
//! A typical setup loads parameters, registers regions, adds people and their contact groups,
//! then calls `init_transmission` before the first `on_became_infectious`:
//!
//! ```rust
//! use ixa_transmission::prelude::*;
//!
//! let mut context = Context::new();
//! context.init_random(1);
//! context.set_parameters(Parameters::default()).unwrap();
//! context.add_region(RegionId(1), 33.75, -84.39).unwrap();
//! let people: Vec<PersonId> = (0..10)
//!     .map(|_| context.add_person(RegionId(1), AgeGroupIndex(0), true))
//!     .collect();
//! context.init_transmission().unwrap();
//!
//! context.on_became_infectious(people[0]);
//! context.add_plan(20.0, Context::shutdown);
//! context.execute();
//! assert!(context.get_contact_statistics().attempts_due > 0);
//! ```
pub mod age_groups;
pub mod contact_groups;
pub mod contact_scheduler;
pub mod context;
pub mod error;
pub mod geo;
pub mod group_selection;
pub mod hashing;
pub mod infection_attempt;
pub mod log;
pub mod modifiers;
pub mod numeric;
pub mod parameters;
pub mod partner_sampling;
pub mod people;
pub mod plan;
pub mod prelude;
pub mod random;
pub mod runner;
pub mod transmission_ratio;

pub use crate::context::Context;
pub use crate::error::TransmissionError;
pub use crate::hashing::{HashMap, HashMapExt, HashSet, HashSetExt};

// Re-exported for use in `define_rng!`.
pub use rand;

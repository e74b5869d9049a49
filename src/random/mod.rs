//! Named, independently seeded random number streams.
//!
//! Every logical sampling decision in the contact model draws from its own stream, declared
//! with `define_rng!`. A stream is seeded from the base seed passed to `init_random` plus a
//! hash of the stream's name, so adding draws to one stream never shifts the values another
//! stream produces.
mod context_ext;
mod sampling;

use std::any::{Any, TypeId};
use std::cell::RefCell;

pub use context_ext::ContextRandomExt;
pub use sampling::{sample_cumulative, sample_uniform_excluding};

use crate::rand::SeedableRng;
use crate::{HashMap, HashMapExt};

pub trait RngId: Copy + Clone + Any {
    type RngType: SeedableRng + 'static;
    fn get_name() -> &'static str;
}

/// Defines a unit type used as the key of an independent random number stream.
#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        #[derive(Copy, Clone)]
        struct $random_id;

        impl $crate::random::RngId for $random_id {
            type RngType = $crate::rand::rngs::SmallRng;

            fn get_name() -> &'static str {
                stringify!($random_id)
            }
        }
    };
}

struct RngHolder {
    rng: Box<dyn Any>,
}

// * base_seed: the seed all streams are derived from
// * rng_holders: streams keyed by their `RngId`, created on first use. Held in a `RefCell` so
//   a stream can be borrowed mutably through a shared borrow of the `Context`.
struct RngData {
    base_seed: u64,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

crate::define_data_plugin!(
    RngPlugin,
    RngData,
    RngData {
        base_seed: 0,
        rng_holders: RefCell::new(HashMap::new()),
    }
);

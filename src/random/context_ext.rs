use std::any::TypeId;
use std::cell::RefMut;

use log::trace;

use crate::context::Context;
use crate::hashing::hash_str;
use crate::rand::distr::uniform::{SampleRange, SampleUniform};
use crate::rand::distr::weighted::WeightedIndex;
use crate::rand::distr::Distribution;
use crate::rand::{Rng, SeedableRng};
use crate::random::{RngHolder, RngId, RngPlugin};

/// Gets a mutable reference to the stream keyed by `R`, creating it from the base seed on
/// first use.
///
/// # Panics
///
/// Panics if `init_random` was never called, or if the stream is already borrowed.
fn get_rng<R: RngId>(context: &Context) -> RefMut<'_, R::RngType> {
    let data_container = context
        .get_data_container(RngPlugin)
        .expect("You must initialize the random number generator with a base seed");

    let rng_holders = data_container.rng_holders.try_borrow_mut().unwrap();
    RefMut::map(rng_holders, |holders| {
        holders
            .entry(TypeId::of::<R>())
            .or_insert_with(|| {
                trace!(
                    "creating stream {} from base seed {}",
                    R::get_name(),
                    data_container.base_seed
                );
                let seed = data_container
                    .base_seed
                    .wrapping_add(hash_str(R::get_name()));
                RngHolder {
                    rng: Box::new(R::RngType::seed_from_u64(seed)),
                }
            })
            .rng
            .downcast_mut::<R::RngType>()
            .unwrap()
    })
}

pub trait ContextRandomExt {
    /// Sets the base seed and discards every existing stream so each is re-seeded on next use.
    fn init_random(&mut self, base_seed: u64);

    /// Applies `sampler` to the stream keyed by `R`.
    fn sample<R: RngId, T>(&self, rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T;

    /// Draws one value from `distribution` using the stream keyed by `R`.
    fn sample_distr<R: RngId, T>(&self, rng_id: R, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng;

    /// Draws a value uniformly from `range`.
    fn sample_range<R: RngId, S, T>(&self, rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform;

    /// Returns `true` with probability `p`.
    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng;

    /// Draws an index into `weights` with probability proportional to its weight.
    ///
    /// # Panics
    ///
    /// Panics if the weights are empty, negative, or all zero.
    fn sample_weighted<R: RngId>(&self, rng_id: R, weights: &[f64]) -> usize
    where
        R::RngType: Rng;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module with base seed {base_seed}");
        let data_container = self.get_data_container_mut(RngPlugin);
        data_container.base_seed = base_seed;
        data_container.rng_holders.get_mut().clear();
    }

    fn sample<R: RngId, T>(&self, _rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let mut rng = get_rng::<R>(self);
        sampler(&mut rng)
    }

    fn sample_distr<R: RngId, T>(&self, _rng_id: R, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng,
    {
        let mut rng = get_rng::<R>(self);
        distribution.sample::<R::RngType>(&mut rng)
    }

    fn sample_range<R: RngId, S, T>(&self, rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample(rng_id, |rng| rng.random_range(range))
    }

    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| rng.random_bool(p))
    }

    fn sample_weighted<R: RngId>(&self, _rng_id: R, weights: &[f64]) -> usize
    where
        R::RngType: Rng,
    {
        let index = WeightedIndex::new(weights).unwrap();
        let mut rng = get_rng::<R>(self);
        index.sample(&mut *rng)
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::define_rng;
    use crate::rand::RngCore;
    use crate::random::ContextRandomExt;

    define_rng!(FooRng);
    define_rng!(BarRng);

    #[test]
    fn streams_advance() {
        let mut context = Context::new();
        context.init_random(42);
        assert_ne!(
            context.sample(FooRng, RngCore::next_u64),
            context.sample(FooRng, RngCore::next_u64)
        );
    }

    #[test]
    fn streams_are_independent() {
        let mut context = Context::new();
        context.init_random(42);
        assert_ne!(
            context.sample(FooRng, RngCore::next_u64),
            context.sample(BarRng, RngCore::next_u64)
        );
    }

    #[test]
    fn draws_on_one_stream_do_not_shift_another() {
        let mut first = Context::new();
        first.init_random(7);
        let expected = first.sample(BarRng, RngCore::next_u64);

        let mut second = Context::new();
        second.init_random(7);
        for _ in 0..10 {
            second.sample(FooRng, RngCore::next_u64);
        }
        assert_eq!(second.sample(BarRng, RngCore::next_u64), expected);
    }

    #[test]
    fn reset_seed() {
        let mut context = Context::new();
        context.init_random(42);
        let run_0 = context.sample(FooRng, RngCore::next_u64);
        let run_1 = context.sample(FooRng, RngCore::next_u64);

        context.init_random(42);
        assert_eq!(run_0, context.sample(FooRng, RngCore::next_u64));
        assert_eq!(run_1, context.sample(FooRng, RngCore::next_u64));

        context.init_random(88);
        assert_ne!(run_0, context.sample(FooRng, RngCore::next_u64));
    }

    #[test]
    #[should_panic(expected = "You must initialize the random number generator with a base seed")]
    fn panic_if_not_initialized() {
        let context = Context::new();
        context.sample_bool(FooRng, 0.5);
    }

    #[test]
    fn sample_range_and_weighted() {
        let mut context = Context::new();
        context.init_random(42);
        let value: usize = context.sample_range(FooRng, 0..10);
        assert!(value < 10);

        let mut zero_counter = 0;
        for _ in 0..3000 {
            if context.sample_weighted(FooRng, &[1.0, 2.0]) == 0 {
                zero_counter += 1;
            }
        }
        // Expected value is 1000.
        assert!((zero_counter - 1000_i32).abs() < 100);
    }
}

//! A priority queue that stores arbitrary data sorted by time
//!
//! Defines a `PlanQueue<T, P>` that stores items of type `T` sorted by `f64` time and an
//! orderable priority `P`. These items are called 'plans'. The queue supports adding plans,
//! cancelling plans, and retrieving the earliest plan. Adding a plan is *O*(log(*n*)) while
//! cancellation and retrieval are *O*(1).
//!
//! `Context` uses this queue to store the callbacks that make up the future of a simulation,
//! most notably each infectious person's next contact attempt.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::{HashMap, HashMapExt};

/// A priority queue that stores arbitrary data sorted by time
///
/// When plans are created they are sequentially assigned a `PlanId`. If two plans are scheduled
/// for the same time then the plan with the lowest priority is placed earlier. If two plans
/// have the same time and priority then the plan that was scheduled first is placed earlier.
///
/// The time, plan id, and priority are stored in a binary heap of `Entry<P>` objects. The data
/// payload is stored in a hash map by plan id. Cancelling a plan removes its payload; the
/// stale heap entry is skipped when it reaches the front of the queue.
pub struct PlanQueue<T, P: Eq + PartialEq + Ord> {
    queue: BinaryHeap<Entry<P>>,
    data_map: HashMap<u64, T>,
    plan_counter: u64,
}

impl<T, P: Eq + PartialEq + Ord> PlanQueue<T, P> {
    #[must_use]
    pub fn new() -> PlanQueue<T, P> {
        PlanQueue {
            queue: BinaryHeap::new(),
            data_map: HashMap::new(),
            plan_counter: 0,
        }
    }

    /// Adds a plan to the queue at the specified time and returns the `PlanId` that can be
    /// used to cancel it.
    pub fn add_plan(&mut self, time: f64, data: T, priority: P) -> PlanId {
        let id = self.plan_counter;
        self.queue.push(Entry { time, id, priority });
        self.data_map.insert(id, data);
        self.plan_counter += 1;
        PlanId(id)
    }

    /// Cancels a plan that has been added to the queue
    ///
    /// # Panics
    ///
    /// Panics if the plan has already been cancelled or executed.
    pub fn cancel_plan(&mut self, id: &PlanId) {
        self.data_map
            .remove(&id.0)
            .expect("Plan does not exist");
    }

    /// Returns `true` if the plan is still waiting in the queue.
    #[must_use]
    pub fn is_pending(&self, id: &PlanId) -> bool {
        self.data_map.contains_key(&id.0)
    }

    /// Removes and returns the earliest plan, or `None` if the queue is empty.
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        while let Some(entry) = self.queue.pop() {
            // Cancelled plans have no data
            if let Some(data) = self.data_map.remove(&entry.id) {
                return Some(Plan {
                    time: entry.time,
                    id: PlanId(entry.id),
                    data,
                });
            }
        }
        None
    }

    /// Number of plans that have neither executed nor been cancelled.
    #[must_use]
    pub fn remaining_plan_count(&self) -> usize {
        self.data_map.len()
    }
}

impl<T, P: Eq + PartialEq + Ord> Default for PlanQueue<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Heap entry, ordered by increasing time, then priority, then plan id.
#[derive(PartialEq, Debug)]
struct Entry<P: Eq + PartialEq + Ord> {
    time: f64,
    id: u64,
    priority: P,
}

impl<P: Eq + PartialEq + Ord> Eq for Entry<P> {}

impl<P: Eq + PartialEq + Ord> PartialOrd for Entry<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// `BinaryHeap` is a max-heap, so every comparison is reversed.
impl<P: Eq + PartialEq + Ord> Ord for Entry<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.id.cmp(&other.id))
            .reverse()
    }
}

/// A unique identifier for a plan added to a `PlanQueue`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlanId(u64);

/// A plan that holds data of type `T` intended to be used at the specified time
pub struct Plan<T> {
    pub time: f64,
    pub id: PlanId,
    pub data: T,
}

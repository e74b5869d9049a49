//! The `Context` drives a simulation: it keeps simulated time, executes scheduled plans and
//! queued callbacks in order, holds module-specific data, and delivers typed events to their
//! subscribers.
//!
//! All of the contact-model logic in this crate is written as extension traits on `Context`
//! whose state lives in data plugins declared with `define_data_plugin!`.
use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::rc::Rc;

use log::trace;

use crate::plan::{PlanId, PlanQueue};
use crate::{HashMap, HashMapExt};

/// A type that provides a data container to be held by `Context`.
pub trait DataPlugin: Any {
    type DataContainer: 'static;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a new unit type that keys a data container stored in `Context`. The container is
/// created from `$default` the first time it is accessed mutably.
#[macro_export]
macro_rules! define_data_plugin {
    ($plugin:ident, $data_container:ty, $default:expr) => {
        #[derive(Copy, Clone)]
        struct $plugin;

        impl $crate::context::DataPlugin for $plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}

/// Marker for values that can be emitted with `Context::emit_event`.
pub trait SimulationEvent: Copy + 'static {}

/// Plans scheduled for the same time run in phase order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExecutionPhase {
    First,
    Normal,
    Last,
}

type Callback = dyn FnOnce(&mut Context);
type EventHandler<E> = dyn Fn(&mut Context, E);

pub struct Context {
    plan_queue: PlanQueue<Box<Callback>, ExecutionPhase>,
    callback_queue: VecDeque<Box<Callback>>,
    event_handlers: HashMap<TypeId, Box<dyn Any>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
    shutdown_requested: bool,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: PlanQueue::new(),
            callback_queue: VecDeque::new(),
            event_handlers: HashMap::new(),
            data_plugins: HashMap::new(),
            current_time: 0.0,
            shutdown_requested: false,
        }
    }

    /// Schedules `callback` to run at `time` in the normal execution phase.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) -> PlanId {
        self.add_plan_with_phase(time, callback, ExecutionPhase::Normal)
    }

    /// Schedules `callback` to run at `time` in the given phase.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan_with_phase(
        &mut self,
        time: f64,
        callback: impl FnOnce(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) -> PlanId {
        assert!(
            !(time.is_nan() || time.is_infinite() || time < self.current_time),
            "Time {time} is invalid (current time is {})",
            self.current_time
        );
        self.plan_queue.add_plan(time, Box::new(callback), phase)
    }

    /// Cancels a plan that has not yet executed.
    ///
    /// # Panics
    ///
    /// Panics if the plan has already executed or been cancelled.
    pub fn cancel_plan(&mut self, id: &PlanId) {
        trace!("cancelling plan {id:?}");
        self.plan_queue.cancel_plan(id);
    }

    #[must_use]
    pub fn is_plan_pending(&self, id: &PlanId) -> bool {
        self.plan_queue.is_pending(id)
    }

    #[must_use]
    pub fn remaining_plan_count(&self) -> usize {
        self.plan_queue.remaining_plan_count()
    }

    /// Queues a callback to run before the next plan, after any callbacks already queued.
    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    /// Registers a handler that is called (as a queued callback) for every emitted `E`.
    pub fn subscribe_to_event<E: SimulationEvent>(
        &mut self,
        handler: impl Fn(&mut Context, E) + 'static,
    ) {
        let handlers = self
            .event_handlers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| -> Box<dyn Any> { Box::new(Vec::<Rc<EventHandler<E>>>::new()) });
        handlers
            .downcast_mut::<Vec<Rc<EventHandler<E>>>>()
            .unwrap()
            .push(Rc::new(handler));
    }

    /// Queues every handler subscribed to `E`. Handlers run after the currently executing
    /// plan or callback returns.
    pub fn emit_event<E: SimulationEvent>(&mut self, event: E) {
        let Context {
            event_handlers,
            callback_queue,
            ..
        } = self;
        if let Some(handlers) = event_handlers.get(&TypeId::of::<E>()) {
            let handlers = handlers.downcast_ref::<Vec<Rc<EventHandler<E>>>>().unwrap();
            for handler in handlers {
                let handler = Rc::clone(handler);
                callback_queue.push_back(Box::new(move |context| handler(context, event)));
            }
        }
    }

    /// Returns the data container for `plugin`, creating it if this is the first access.
    pub fn get_data_container_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()))
            .downcast_mut::<T::DataContainer>()
            .unwrap()
    }

    /// Returns the data container for `plugin`, or `None` if it was never created.
    #[must_use]
    pub fn get_data_container<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|container| container.downcast_ref::<T::DataContainer>())
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Stops the event loop once the current plan or callback returns.
    pub fn shutdown(&mut self) {
        trace!("shutdown requested at t={}", self.current_time);
        self.shutdown_requested = true;
    }

    /// Runs queued callbacks and plans until both queues are empty or `shutdown` is called.
    pub fn execute(&mut self) {
        trace!("entering event loop");
        loop {
            if self.shutdown_requested {
                self.shutdown_requested = false;
                break;
            }

            if let Some(callback) = self.callback_queue.pop_front() {
                callback(self);
                continue;
            }

            if let Some(plan) = self.plan_queue.get_next_plan() {
                self.current_time = plan.time;
                (plan.data)(self);
            } else {
                break;
            }
        }
        trace!("event loop finished at t={}", self.current_time);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

//! Logging for the contact model. This is diagnostic output about what the model is doing (plans
//! scheduled and cancelled, thinning rejections, radiation-model fallbacks), not reporting.
//!
//! The module re-exports the five `log` macros: `error!`, `warn!`, `info!`, `debug!` and
//! `trace!`. Logging is _disabled_ by default. It can be enabled with the runner's
//! `--log-level <level>` option or from code:
//!
//!  - `enable_logging()`: turns on all log messages
//!  - `disable_logging()`: turns off all log messages
//!  - `set_log_level(level: LevelFilter)`: enables only messages with priority at least `level`
//!
//! Per-module filters narrow or widen the global level for a module path:
//!
//! ```rust
//! use ixa_transmission::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! pub fn setup_logging() {
//!     set_log_level(LevelFilter::Info);
//!     // Follow every contact attempt, but nothing else at trace level.
//!     set_module_filter("ixa_transmission::contact_scheduler", LevelFilter::Trace);
//! }
//! ```
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};
use std::collections::hash_map::Entry;
use std::sync::{LazyLock, Mutex, MutexGuard};

use crate::{HashMap, HashMapExt};

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;
const DEFAULT_MODULE_FILTERS: [(&str, LevelFilter); 1] = [
    // One trace line per stream creation is noise at trace level.
    ("ixa_transmission::random", LevelFilter::Info),
];

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// A level filter applied to the messages of one module path (e.g.
/// `"ixa_transmission::geo"`).
#[derive(Debug, PartialEq)]
struct ModuleLogConfiguration {
    module: String,
    level: LevelFilter,
}

impl From<(&str, LevelFilter)> for ModuleLogConfiguration {
    fn from((module, level): (&str, LevelFilter)) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

/// Tracks the global level and the module filters and owns the handle to the installed
/// logger. Loggers are process-global, so there is exactly one instance, reached through the
/// free functions below.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// Level for modules without their own filter. `LevelFilter::Off` disables logging.
    pub(in crate::log) global_log_level: LevelFilter,
    pub(in crate::log) module_configurations: HashMap<String, ModuleLogConfiguration>,

    #[cfg(feature = "logging")]
    root_handle: Option<log4rs::Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        let mut module_configurations = HashMap::new();
        for (module, level) in DEFAULT_MODULE_FILTERS {
            module_configurations.insert(module.to_string(), (module, level).into());
        }
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_configurations,
            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    fn set_log_level(&mut self, level: LevelFilter) {
        self.global_log_level = level;
        self.set_config();
    }

    /// Returns true if the configuration changed.
    fn insert_module_filter(&mut self, module: &str, level: LevelFilter) -> bool {
        match self.module_configurations.entry(module.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().level == level {
                    return false;
                }
                entry.get_mut().level = level;
            }
            Entry::Vacant(entry) => {
                entry.insert((module, level).into());
            }
        }
        true
    }

    fn set_module_filters(&mut self, module_filters: &[(&str, LevelFilter)]) {
        let mut mutated = false;
        for (module, level) in module_filters {
            mutated |= self.insert_module_filter(module, *level);
        }
        if mutated {
            self.set_config();
        }
    }

    fn remove_module_filter(&mut self, module: &str) {
        if self.module_configurations.remove(module).is_some() {
            self.set_config();
        }
    }
}

/// Enables every log message. Equivalent to `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Disables logging completely. Equivalent to `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the global log level.
pub fn set_log_level(level: LevelFilter) {
    get_log_configuration().set_log_level(level);
}

/// Sets a level filter for the given module path.
pub fn set_module_filter(module_path: &str, level_filter: LevelFilter) {
    get_log_configuration().set_module_filters(&[(module_path, level_filter)]);
}

/// Sets several module filters at once, rebuilding the logger only once.
pub fn set_module_filters(module_filters: &[(&str, LevelFilter)]) {
    get_log_configuration().set_module_filters(module_filters);
}

/// Removes the filter for a module path so the global level applies to it again.
pub fn remove_module_filter(module_path: &str) {
    get_log_configuration().remove_module_filter(module_path);
}

fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    LOG_CONFIGURATION.lock().expect("Mutex poisoned")
}

#[cfg(test)]
mod tests {
    use super::{get_log_configuration, remove_module_filter, set_log_level, set_module_filters};
    use log::LevelFilter;
    use std::sync::{LazyLock, Mutex};

    // Logging tests share the global logger and must run serially.
    static TEST_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

    #[test]
    fn set_log_level_updates_configuration() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        set_log_level(LevelFilter::Error);
        assert_eq!(get_log_configuration().global_log_level, LevelFilter::Error);
        set_log_level(LevelFilter::Trace);
        assert_eq!(get_log_configuration().global_log_level, LevelFilter::Trace);
        set_log_level(LevelFilter::Off);
    }

    #[test]
    fn module_filters_can_be_added_and_removed() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        set_module_filters(&[
            ("ixa_transmission::random", LevelFilter::Error),
            ("ixa_transmission::geo", LevelFilter::Debug),
        ]);
        {
            let config = get_log_configuration();
            assert_eq!(
                config.module_configurations.get("ixa_transmission::geo"),
                Some(&("ixa_transmission::geo", LevelFilter::Debug).into())
            );
            assert_eq!(
                config.module_configurations.get("ixa_transmission::random"),
                Some(&("ixa_transmission::random", LevelFilter::Error).into())
            );
        }

        remove_module_filter("ixa_transmission::geo");
        assert!(!get_log_configuration()
            .module_configurations
            .contains_key("ixa_transmission::geo"));
        set_module_filters(&[("ixa_transmission::random", LevelFilter::Info)]);
    }
}

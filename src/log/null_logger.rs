//! Without the `logging` feature no logger is installed; only the `log` crate's maximum level
//! is kept in step with the configuration.

use crate::log::LogConfiguration;

impl LogConfiguration {
    pub(in crate::log) fn set_config(&mut self) {
        log::set_max_level(self.global_log_level);
    }
}

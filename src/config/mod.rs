// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration management for pollers
//!
//! This module loads polling schedules and diagnostic settings from a YAML
//! file and the environment.
//!
//! # Environment Variables
//!
//! The following environment variables are supported:
//!
//! - `RESOURCE_POLLER_CONFIG` - Path to the config file (default: `~/.config/resource-poller/config.yaml`)
//! - `RESOURCE_POLLER_MAX_ATTEMPTS` - Override the wait schedule's attempt count
//! - `RESOURCE_POLLER_INITIAL_DELAY_MS` - Override the wait schedule's initial delay
//! - `RESOURCE_POLLER_BACKOFF_FACTOR` - Override the wait schedule's backoff factor
//!
//! # Example
//!
//! ```no_run
//! use resource_poller::config::PollConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PollConfig::load_with_env()?;
//! let schedule = config.wait_schedule()?;
//! println!("Waiting at most {:?}", schedule.worst_case_duration());
//! # Ok(())
//! # }
//! ```

mod pollconfig;

pub use pollconfig::{
    PollConfig, ScheduleConfig, ENV_BACKOFF_FACTOR, ENV_CONFIG, ENV_INITIAL_DELAY_MS,
    ENV_MAX_ATTEMPTS,
};

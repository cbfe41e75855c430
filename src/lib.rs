//! Rolling-horizon unit commitment and economic dispatch for power systems.
//!
//! A model's timeline is divided into stages, each of which is formulated as a mixed-integer
//! linear program and solved in turn. The state of each generator at the end of a stage's
//! committed period becomes the initial condition for the next stage, and the committed parts of
//! the stage solutions are stitched together into a single solution for the whole timeline.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod commitment;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod optimisation;
pub mod output;
pub mod power_system;
pub mod settings;
pub mod solution;
pub mod timeline;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the folder where program configuration files are stored.
///
/// Falls back to the current folder if the platform has no standard config folder.
pub fn get_config_dir() -> PathBuf {
    let Some(mut path) = dirs::config_dir() else {
        return PathBuf::new();
    };
    path.push("horizon-uc");

    path
}

//! Shared test harness modules for the overpoi CLI.

use super::*;

mod acquire_steps;
mod helpers;

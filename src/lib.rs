//! Client core for the GrowPod on-chain farming game: reads an account's
//! application state from an Algorand node, derives pod status and cooldowns,
//! and schedules local reminders for when care actions become available.

pub mod clock;
pub mod config;
pub mod controller;
pub mod cooldown;
pub mod format;
pub mod game_state;
pub mod ledger;
pub mod logging;
pub mod notifications;
pub mod pods;
pub mod poller;

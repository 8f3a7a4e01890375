//! # beakn-server
//!
//! Host service for the beakn region tracker.
//!
//! This library provides the API handlers and state management; the
//! `beakn-server` binary wires them to a listener.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;

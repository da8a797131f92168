//! # beacon-server
//!
//! HTTP server library for the beacon proximity correlation system.
//!
//! This library provides the API handlers and state management for beacon.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;

//! # Blockflow - Reactive Block Composition Server
//!
//! Library surface of the Blockflow binary. The interesting pieces live
//! in [`engine`] (the update scheduler) and [`api`] (the REST boundary);
//! [`cli`] and [`config`] wire them together.

pub mod api;
pub mod cli;
pub mod config;
pub mod engine;

//! Ventilator control core.
//!
//! Pure-logic crate: the breathing-cycle controller ([`fsm`]), the error
//! latch ([`latch`]) and the alarm priority supervisor ([`alarm`]), wired
//! together behind [`app::service::VentService`].  Hardware is reached only
//! through the port traits in [`app::ports`]; the board crate supplies the
//! adapters and the logger.

#![deny(unused_must_use)]

pub mod adapters;
pub mod alarm;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod fsm;
pub mod latch;
pub mod params;

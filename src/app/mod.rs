//! Application core: pure domain logic, zero I/O.
//!
//! This module wires the breath-cycle controller, error latch and alarm
//! supervisor together behind [`service::VentService`].  All interaction
//! with hardware happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;

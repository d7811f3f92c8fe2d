//! Control-law building blocks used by the breathing-cycle controller.

pub mod pid;
pub mod pressure;
pub mod volume;

//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements    | Connects to                 |
//! |-------------|---------------|-----------------------------|
//! | `indicator` | IndicatorPort | Two `embedded-hal` GPIO pins|
//! | `log_sink`  | EventSink     | `log` facade                |
//!
//! Motor, pressure, volume and display adapters live with the board
//! support code.

pub mod indicator;
pub mod log_sink;

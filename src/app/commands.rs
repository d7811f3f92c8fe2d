//! Inbound commands to the application service.
//!
//! These represent caregiver actions (keypad, serial console) that the
//! [`VentService`](super::service::VentService) interprets.  Parameter and
//! threshold edits go through the service's typed setters instead, since
//! they can be rejected.

/// Commands that external adapters can send into the control core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VentCommand {
    /// Begin cycling; while cycling, cancel a pending STOP.
    Start,

    /// Finish the current breath, then return to IDLE.
    Stop,

    /// Return to IDLE immediately and home the motor.
    Abort,

    /// Acknowledge the latched alarm.
    Silence,

    /// Mute the buzzer for the configured window.
    PauseAudio,
}

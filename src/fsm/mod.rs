//! Function-pointer finite state machine engine for the breath cycle.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                         │
//! │  ┌─────────┬──────────┬─────────┬───────────────────┬────────────┐  │
//! │  │ State   │ on_enter │ on_exit │ on_update         │ on_alert   │  │
//! │  ├─────────┼──────────┼─────────┼───────────────────┼────────────┤  │
//! │  │ Idle    │ fn(ctx)  │    —    │ fn(ctx)->Option<> │     —      │  │
//! │  │ Inhale  │ fn(ctx)  │ fn(ctx) │ fn(ctx)->Option<> │ fn(ctx,a)  │  │
//! │  │ Plateau │ fn(ctx)  │    —    │ fn(ctx)->Option<> │ fn(ctx,a)  │  │
//! │  │ Pause   │ fn(ctx)  │    —    │ fn(ctx)->Option<> │     —      │  │
//! │  │ Exhale  │ fn(ctx)  │    —    │ fn(ctx)->Option<> │ fn(ctx,a)  │  │
//! │  └─────────┴──────────┴─────────┴───────────────────┴────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.  A
//! drained pressure alert is routed to `on_alert`, if the state has one.
//! Either may return `Some(next)`: the engine runs `on_exit` for the
//! current state, stamps the phase start time, pushes a
//! [`Report::Entered`] and runs `on_enter` for the next.

pub mod context;
pub mod states;

use core::fmt;

use context::{BreathContext, Report};
use log::info;

use crate::events::PressureAlert;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Breath-cycle states.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BreathState {
    Idle = 0,
    Inhale = 1,
    Plateau = 2,
    Pause = 3,
    Exhale = 4,
}

impl BreathState {
    pub const COUNT: usize = 5;

    /// Convert a table index back to a state.  Out-of-range indices map
    /// to `Idle`, the safe state.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            1 => Self::Inhale,
            2 => Self::Plateau,
            3 => Self::Pause,
            4 => Self::Exhale,
            0 => Self::Idle,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }

    /// Whether a breath is in progress.
    pub fn is_cycling(self) -> bool {
        self != Self::Idle
    }
}

impl fmt::Display for BreathState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Inhale => "INHALE",
            Self::Plateau => "PLATEAU",
            Self::Pause => "PAUSE",
            Self::Exhale => "EXHALE",
        })
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

pub type StateActionFn = fn(&mut BreathContext);

/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut BreathContext) -> Option<BreathState>;

/// Handles one pressure alert; may force a transition.
pub type StateAlertFn = fn(&mut BreathContext, PressureAlert) -> Option<BreathState>;

/// Static descriptor for a single state.
pub struct StateDescriptor {
    pub id: BreathState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
    /// `None` ignores alerts in this state.
    pub on_alert: Option<StateAlertFn>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The breath-cycle state machine engine.
pub struct Fsm {
    table: [StateDescriptor; BreathState::COUNT],
    current: usize,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; BreathState::COUNT], initial: BreathState) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut BreathContext) {
        info!("BCC starting in state: {}", self.table[self.current].name);
        ctx.phase_start_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance by one tick at `ctx.now_ms`.
    pub fn tick(&mut self, ctx: &mut BreathContext) {
        if let Some(next) = (self.table[self.current].on_update)(ctx) {
            self.transition(next, ctx);
        }
    }

    /// Route a pressure alert to the current state.
    pub fn alert(&mut self, alert: PressureAlert, ctx: &mut BreathContext) {
        let Some(handler) = self.table[self.current].on_alert else {
            return;
        };
        if let Some(next) = handler(ctx, alert) {
            self.transition(next, ctx);
        }
    }

    /// Immediate transition regardless of what `on_update` would return
    /// (START out of IDLE, ABORT).
    pub fn force_transition(&mut self, next: BreathState, ctx: &mut BreathContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> BreathState {
        BreathState::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: BreathState, ctx: &mut BreathContext) {
        let next_idx = next as usize;
        let from = self.current_state();

        info!(
            "BCC transition: {} -> {} after {}ms",
            self.table[self.current].name,
            self.table[next_idx].name,
            ctx.ms_in_state()
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        ctx.phase_start_ms = ctx.now_ms;
        ctx.report(Report::Entered { from, to: next });

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

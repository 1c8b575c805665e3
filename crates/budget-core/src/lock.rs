//! App lock: a two-state machine fed by host lifecycle signals.
//!
//! Any loss of visibility or focus locks unconditionally, and regaining it
//! never unlocks. The only way back to `Unlocked` is a verified PIN, which
//! hands the controller a freshly derived session key. Locking drops the
//! key (zeroized on drop).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::crypto::EncryptionKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    Locked,
    Unlocked,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Locked => f.write_str("locked"),
            LockState::Unlocked => f.write_str("unlocked"),
        }
    }
}

/// Signals the host environment reports about the app's window/page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// Visibility changed to hidden (tab switched, app backgrounded).
    Hidden,
    /// Visibility changed to visible.
    Visible,
    /// Window lost input focus.
    Blur,
    /// Window gained input focus.
    Focus,
    /// Page is being torn down or navigated away from.
    PageHide,
    /// Page shown again; `restored` when resumed from a cached snapshot.
    PageShow { restored: bool },
}

impl FromStr for LifecycleSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hide" | "hidden" => Ok(Self::Hidden),
            "show" | "visible" => Ok(Self::Visible),
            "blur" => Ok(Self::Blur),
            "focus" => Ok(Self::Focus),
            "pagehide" => Ok(Self::PageHide),
            "pageshow" | "restore" => Ok(Self::PageShow { restored: true }),
            "load" => Ok(Self::PageShow { restored: false }),
            other => Err(format!("unknown lifecycle signal: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEvent {
    Lifecycle(LifecycleSignal),
    PinVerified,
}

/// Pure transition function. No I/O, no clocks.
pub fn transition(state: LockState, event: LockEvent) -> LockState {
    match event {
        LockEvent::PinVerified => LockState::Unlocked,
        LockEvent::Lifecycle(signal) => match signal {
            LifecycleSignal::Hidden
            | LifecycleSignal::Blur
            | LifecycleSignal::PageHide
            | LifecycleSignal::PageShow { restored: true } => LockState::Locked,
            LifecycleSignal::Visible
            | LifecycleSignal::Focus
            | LifecycleSignal::PageShow { restored: false } => state,
        },
    }
}

pub fn initial_state(has_pin: bool) -> LockState {
    if has_pin {
        LockState::Locked
    } else {
        LockState::Unlocked
    }
}

/// Holds the lock state and, while unlocked, the session key.
#[derive(Debug)]
pub struct LockController {
    state: LockState,
    session_key: Option<EncryptionKey>,
}

impl LockController {
    pub fn new(has_pin: bool) -> Self {
        Self {
            state: initial_state(has_pin),
            session_key: None,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == LockState::Locked
    }

    pub fn session_key(&self) -> Option<&EncryptionKey> {
        match self.state {
            LockState::Unlocked => self.session_key.as_ref(),
            LockState::Locked => None,
        }
    }

    pub fn handle(&mut self, signal: LifecycleSignal) -> LockState {
        let next = transition(self.state, LockEvent::Lifecycle(signal));
        if next == LockState::Locked {
            self.session_key = None;
            if self.state != LockState::Locked {
                info!(?signal, "app locked");
            }
        }
        self.state = next;
        next
    }

    /// Force the locked state, dropping any session key.
    pub fn lock(&mut self) {
        self.session_key = None;
        self.state = LockState::Locked;
    }

    /// Only callable after the PIN has been verified and the key derived.
    pub(crate) fn unlock(&mut self, key: EncryptionKey) {
        self.state = transition(self.state, LockEvent::PinVerified);
        self.session_key = Some(key);
        info!("app unlocked");
    }

    /// Back to first-run: unlocked, no PIN, no key.
    pub(crate) fn reset(&mut self) {
        self.session_key = None;
        self.state = LockState::Unlocked;
    }
}

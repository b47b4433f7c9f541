//! Half-stream lifecycle state as a small bitset of flags.
//!
//! Each half of a logical stream progresses
//! `Idle -> Opening -> Open -> Closing -> Closed`, with an orthogonal Reset
//! terminal reachable from Opening or Open. Bits are only ever set, never
//! cleared, so the derived lifecycle can only move forward.

/// Derived lifecycle of one half-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfState {
    /// No Begin observed yet.
    Idle,
    /// Begin sent or received, no credit yet.
    Opening,
    /// Credit granted (Window) or first Data exchanged.
    Open,
    /// Terminal frame observed, drain in progress.
    Closing,
    /// Terminal frame forwarded, or Reset. No frame may follow.
    Closed,
}

const OPENING: u8 = 0x01;
const OPENED: u8 = 0x02;
const CLOSING: u8 = 0x04;
const CLOSED: u8 = 0x08;
const RESET: u8 = 0x10;

/// Bitset of lifecycle flags for one half-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HalfStreamState(u8);

impl HalfStreamState {
    /// Record a Begin (sent or received).
    #[must_use]
    pub fn opening(self) -> Self {
        Self(self.0 | OPENING)
    }

    /// Record the first credit grant or Data exchange.
    #[must_use]
    pub fn open(self) -> Self {
        Self(self.0 | OPENING | OPENED)
    }

    /// Record a terminal frame observed; drain still pending.
    #[must_use]
    pub fn closing(self) -> Self {
        Self(self.0 | CLOSING)
    }

    /// Record the terminal frame fully forwarded.
    #[must_use]
    pub fn close(self) -> Self {
        Self(self.0 | CLOSING | CLOSED)
    }

    /// Record a Reset; the half is closed immediately and pending credit is
    /// invalid.
    #[must_use]
    pub fn reset(self) -> Self {
        Self(self.0 | RESET | CLOSING | CLOSED)
    }

    /// Begin observed.
    #[inline]
    pub fn is_opening(self) -> bool {
        self.0 & OPENING != 0
    }

    /// Credit granted or first Data exchanged.
    #[inline]
    pub fn is_open(self) -> bool {
        self.0 & OPENED != 0
    }

    /// Terminal frame observed.
    #[inline]
    pub fn is_closing(self) -> bool {
        self.0 & CLOSING != 0
    }

    /// Terminal frame forwarded or Reset.
    #[inline]
    pub fn is_closed(self) -> bool {
        self.0 & CLOSED != 0
    }

    /// Reset observed.
    #[inline]
    pub fn is_reset(self) -> bool {
        self.0 & RESET != 0
    }

    /// The derived lifecycle state.
    pub fn lifecycle(self) -> HalfState {
        if self.is_closed() {
            HalfState::Closed
        } else if self.is_closing() {
            HalfState::Closing
        } else if self.is_open() {
            HalfState::Open
        } else if self.is_opening() {
            HalfState::Opening
        } else {
            HalfState::Idle
        }
    }
}

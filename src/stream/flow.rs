//! Per-half-stream flow-control bookkeeping and frame validation.
//!
//! One [`StreamFlow`] exists per logical stream and holds two independently
//! flow-controlled halves (initial and reply). Each half validates the frames
//! observed on it against the lifecycle bitset and the last granted window:
//! cumulative `sequence` must never exceed `acknowledge + maximum`.
//!
//! Violations are reported as [`GatewireError::ProtocolViolation`]; the caller
//! answers them with Reset (initial half) or Abort (reply half) and never
//! propagates them as a process fault.

use crate::error::{GatewireError, Result};
use crate::protocol::{Data, Flush, FrameHeader, Window};

use super::state::{HalfState, HalfStreamState};

/// Check the header invariant that holds on every frame of a half-stream.
pub fn validate_header(header: &FrameHeader) -> Result<()> {
    if header.acknowledge > header.sequence {
        return Err(GatewireError::ProtocolViolation(format!(
            "acknowledge {} exceeds sequence {} on stream {:#x}",
            header.acknowledge, header.sequence, header.stream_id
        )));
    }
    Ok(())
}

/// Window bookkeeping for one half-stream.
///
/// `sequence` tracks cumulative bytes reserved by the sender; `acknowledge`
/// and `maximum` track the receiver's last grant. `padding` is the
/// reservation overhead the sender adds to payload length when computing
/// `reserved`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfWindow {
    /// Cumulative reserved bytes observed.
    pub sequence: i64,
    /// Cumulative acknowledged bytes from the last grant.
    pub acknowledge: i64,
    /// Window ceiling from the last grant.
    pub maximum: u32,
    /// Per-frame reservation overhead from the last grant.
    pub padding: u32,
    /// Minimum frame size from the last grant.
    pub minimum: u32,
    /// Shared credit pool from the last grant; 0 = none.
    pub budget_id: u64,
}

impl HalfWindow {
    /// Credit bytes still available to the sender.
    #[inline]
    pub fn available(&self) -> i64 {
        self.acknowledge + i64::from(self.maximum) - self.sequence
    }

    /// Credit bytes a payload of `payload_len` consumes under this window.
    #[inline]
    pub fn reserved_for(&self, payload_len: usize) -> u32 {
        payload_len as u32 + self.padding
    }

    fn advance(&mut self, stream_id: u64, sequence: i64, reserved: u32) -> Result<()> {
        if sequence < self.sequence {
            return Err(GatewireError::ProtocolViolation(format!(
                "sequence regressed from {} to {} on stream {:#x}",
                self.sequence, sequence, stream_id
            )));
        }

        let next = sequence + i64::from(reserved);
        if next > self.acknowledge + i64::from(self.maximum) {
            return Err(GatewireError::ProtocolViolation(format!(
                "sequence {} exceeds window {} + {} on stream {:#x}",
                next, self.acknowledge, self.maximum, stream_id
            )));
        }

        self.sequence = next;
        Ok(())
    }

    fn grant(
        &mut self,
        stream_id: u64,
        acknowledge: i64,
        maximum: u32,
        padding: u32,
        minimum: u32,
        budget_id: u64,
    ) -> Result<()> {
        if acknowledge < self.acknowledge {
            return Err(GatewireError::ProtocolViolation(format!(
                "acknowledge regressed from {} to {} on stream {:#x}",
                self.acknowledge, acknowledge, stream_id
            )));
        }
        if acknowledge > self.sequence {
            return Err(GatewireError::ProtocolViolation(format!(
                "acknowledge {} overtakes sequence {} on stream {:#x}",
                acknowledge, self.sequence, stream_id
            )));
        }

        self.acknowledge = acknowledge;
        self.maximum = maximum;
        self.padding = padding;
        self.minimum = minimum;
        self.budget_id = budget_id;
        Ok(())
    }
}

/// Lifecycle and window state for one half-stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfFlow {
    /// Lifecycle flag bits.
    pub state: HalfStreamState,
    /// Flow-control window.
    pub window: HalfWindow,
}

impl HalfFlow {
    /// The derived lifecycle state.
    #[inline]
    pub fn lifecycle(&self) -> HalfState {
        self.state.lifecycle()
    }

    /// Apply an observed Begin.
    pub fn on_begin(&mut self, header: &FrameHeader) -> Result<()> {
        validate_header(header)?;
        if self.state.is_closed() {
            return Err(GatewireError::ProtocolViolation(format!(
                "Begin after close on stream {:#x}",
                header.stream_id
            )));
        }
        if self.state.is_opening() {
            return Err(GatewireError::ProtocolViolation(format!(
                "duplicate Begin on stream {:#x}",
                header.stream_id
            )));
        }

        self.state = self.state.opening();
        self.window.sequence = header.sequence;
        self.window.acknowledge = header.acknowledge;
        self.window.maximum = header.maximum;
        Ok(())
    }

    /// Apply an observed Data, enforcing the window bound.
    pub fn on_data(&mut self, data: &Data<'_>) -> Result<()> {
        validate_header(&data.header)?;
        self.check_payload_allowed(data.header.stream_id, "Data")?;
        self.window
            .advance(data.header.stream_id, data.header.sequence, data.reserved)?;
        // First Data implies the sender considers the half open.
        self.state = self.state.open();
        Ok(())
    }

    /// Apply an observed Flush; reserves credit without payload advance.
    pub fn on_flush(&mut self, flush: &Flush<'_>) -> Result<()> {
        validate_header(&flush.header)?;
        self.check_payload_allowed(flush.header.stream_id, "Flush")?;
        self.window
            .advance(flush.header.stream_id, flush.header.sequence, flush.reserved)
    }

    /// Apply an observed Window grant; transitions Opening to Open.
    pub fn on_window(&mut self, window: &Window) -> Result<()> {
        validate_header(&window.header)?;
        if self.state.is_closed() {
            return Err(GatewireError::ProtocolViolation(format!(
                "Window after close on stream {:#x}",
                window.header.stream_id
            )));
        }
        if !self.state.is_opening() {
            return Err(GatewireError::ProtocolViolation(format!(
                "Window before Begin on stream {:#x}",
                window.header.stream_id
            )));
        }

        self.window.grant(
            window.header.stream_id,
            window.header.acknowledge,
            window.header.maximum,
            window.padding,
            window.minimum,
            window.budget_id,
        )?;
        self.state = self.state.open();
        Ok(())
    }

    /// Apply an observed End. Returns false if the half is already closed
    /// (duplicate terminal frames are ignored).
    pub fn on_end(&mut self) -> bool {
        if self.state.is_closed() {
            return false;
        }
        self.state = self.state.closing();
        true
    }

    /// Apply an observed Abort. Returns false if already closed.
    pub fn on_abort(&mut self) -> bool {
        if self.state.is_closed() {
            return false;
        }
        self.state = self.state.closing();
        true
    }

    /// Apply an observed Reset: the half closes immediately and pending
    /// credit is invalidated. Returns false if already closed.
    pub fn on_reset(&mut self) -> bool {
        if self.state.is_closed() {
            return false;
        }
        self.state = self.state.reset();
        true
    }

    /// Record that the terminating frame has been forwarded downstream;
    /// completes `Closing -> Closed`. Closing a half must not be reported
    /// before accepted Data has drained.
    pub fn mark_drained(&mut self) {
        self.state = self.state.close();
    }

    fn check_payload_allowed(&self, stream_id: u64, kind: &str) -> Result<()> {
        if self.state.is_closed() {
            return Err(GatewireError::ProtocolViolation(format!(
                "{kind} after close on stream {stream_id:#x}"
            )));
        }
        if !self.state.is_opening() {
            return Err(GatewireError::ProtocolViolation(format!(
                "{kind} before Begin on stream {stream_id:#x}"
            )));
        }
        Ok(())
    }
}

/// Flow-control state for one logical stream: an initial half and a reply
/// half, each independently flow-controlled.
///
/// The record is created by the Begin on the initial half and destroyed when
/// both halves reach Closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamFlow {
    /// The odd-id half carrying the initial direction.
    pub initial: HalfFlow,
    /// The even-id half carrying the reply direction.
    pub reply: HalfFlow,
}

impl StreamFlow {
    /// The half a frame with this header belongs to.
    pub fn half_mut(&mut self, header: &FrameHeader) -> &mut HalfFlow {
        if header.is_initial() {
            &mut self.initial
        } else {
            &mut self.reply
        }
    }

    /// Both halves have reached Closed; the record can be destroyed.
    pub fn is_closed(&self) -> bool {
        self.initial.state.is_closed() && self.reply.state.is_closed()
    }
}

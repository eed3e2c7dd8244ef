//! OBD-II diagnostic poller
//!
//! Ties the ISO-TP framing helpers and the poll-list cursor together into a
//! single send/receive/state-set state machine: one PID is requested per
//! tick (send side), and a matching response - single-frame or a reassembled
//! multi-frame sequence - is decoded and handed back frame-by-frame so the
//! caller can forward each accepted delivery straight to the active driver's
//! `incoming_poll_reply`, which is invoked exactly once per accepted frame.

pub mod isotp;
pub mod poll_list;

pub use isotp::{
    Delivery, FLOW_CONTROL_FRAME, FrameOutcome, Reassembler, build_extended_request,
    build_standard_request,
};
pub use poll_list::{NSTATES, PidDescriptor, PollContext, PollCursor, PollKind, PollState};

use crate::can::CanFrame;
use crate::error::Result;

/// Drives the send/receive cycle for one active poll list.
///
/// Send and receive share `outstanding`/`reassembler` without a lock. This
/// assumes a response (or timeout) resolves before the next 1 Hz send, so
/// both sides are driven from the same single-threaded tick/frame loop in
/// `driver::runtime`.
pub struct Poller {
    cursor: PollCursor,
    reassembler: Reassembler,
    state: PollState,
    outstanding: Option<PidDescriptor>,
}

impl Poller {
    pub fn new() -> Self {
        Self {
            cursor: PollCursor::new(),
            reassembler: Reassembler::new(),
            state: PollState::Idle,
            outstanding: None,
        }
    }

    /// Current state of the poll cycle
    pub fn state(&self) -> PollState {
        self.state
    }

    /// The poller's own free-running tick counter (mod 3600)
    pub fn tick_counter(&self) -> u32 {
        self.cursor.tick_counter()
    }

    /// Reset the cursor to the list head and zero the tick counter on a
    /// poll-state transition.
    pub fn reset_on_state_change(&mut self) {
        self.cursor = PollCursor::new();
        self.state = PollState::Idle;
        self.outstanding = None;
        self.reassembler = Reassembler::new();
    }

    /// Send the next eligible PID request, if any, on the frame sink `send`.
    /// Invoked once per 1 Hz tick when a poll list is installed. Returns the
    /// descriptor that was sent, or `None` if nothing in `list` is currently
    /// eligible this tick.
    pub fn send_next(
        &mut self,
        list: &[PidDescriptor],
        ctx: &PollContext,
        mut send: impl FnMut(CanFrame) -> Result<()>,
    ) -> Result<Option<PidDescriptor>> {
        let Some(idx) = self.cursor.next_eligible(list, ctx) else {
            return Ok(None);
        };
        let descriptor = list[idx];
        let payload = if descriptor.kind.is_extended() {
            build_extended_request(descriptor.pid)
        } else {
            build_standard_request(descriptor.kind.mode(), descriptor.pid as u8)
        };
        let frame = CanFrame::new(0, descriptor.request_id(), &payload, false);
        send(frame)?;

        // A fresh request always starts a fresh reassembly, even if the
        // previous one never completed.
        self.reassembler = Reassembler::new();
        self.outstanding = Some(descriptor);
        self.state = PollState::AwaitingResponse;
        Ok(Some(descriptor))
    }

    /// Feed one received CAN frame into the poller. Returns the accepted
    /// `(descriptor, payload)` delivery for this frame, if any - every
    /// accepted frame produces exactly one delivery, not just the final one
    /// of a multi-frame sequence. Frames that fail the accept
    /// predicate, or arrive with no outstanding request, are silently
    /// dropped and yield `None`.
    ///
    /// When a first frame is accepted, a flow-control frame is transmitted
    /// via `send` before this call returns.
    pub fn handle_frame(
        &mut self,
        frame: &CanFrame,
        mut send: impl FnMut(CanFrame) -> Result<()>,
    ) -> Result<Option<(PidDescriptor, Vec<u8>)>> {
        let Some(descriptor) = self.outstanding else {
            return Ok(None);
        };
        if !descriptor.response_matches(frame.id) {
            return Ok(None);
        }

        let outcome = self.reassembler.feed(
            &frame.data,
            descriptor.kind.mode(),
            descriptor.pid,
            descriptor.kind.is_extended(),
        );

        match outcome {
            FrameOutcome::Delivered(Delivery { payload, ml_remain }) => {
                if ml_remain == 0 {
                    self.state = PollState::Done;
                    self.outstanding = None;
                }
                Ok(Some((descriptor, payload)))
            }
            FrameOutcome::DeliveredNeedsFlowControl(Delivery { payload, .. }) => {
                let target = descriptor.flow_control_target(frame.id);
                let fc = CanFrame::new(frame.bus, target, &FLOW_CONTROL_FRAME, frame.extended);
                send(fc)?;
                Ok(Some((descriptor, payload)))
            }
            FrameOutcome::Ignored => Ok(None),
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid_list() -> Vec<PidDescriptor> {
        vec![PidDescriptor {
            name: "speed",
            kind: PollKind::Current,
            tx_module_id: 0,
            rx_module_id: 0,
            pid: 0x0d,
            poll_period: [1; NSTATES],
        }]
    }

    #[test]
    fn send_then_receive_single_frame() {
        let mut poller = Poller::new();
        let list = pid_list();
        let ctx = PollContext::default();

        let sent = poller.send_next(&list, &ctx, |_f| Ok(())).unwrap();
        assert_eq!(sent.unwrap().name, "speed");
        assert_eq!(poller.state(), PollState::AwaitingResponse);

        let reply = CanFrame::new(0, 0x7E8, &[0x02, 0x41, 0x0d, 0x00, 0x00], false);
        let out = poller.handle_frame(&reply, |_f| Ok(())).unwrap();
        let (descriptor, payload) = out.unwrap();
        assert_eq!(descriptor.name, "speed");
        assert_eq!(payload, vec![0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(poller.state(), PollState::Done);
    }

    #[test]
    fn extended_pid_round_trip_matches_e2e_scenario() {
        // Extended 16-bit PID over a three-frame ISO-TP reassembly.
        let mut poller = Poller::new();
        let list = vec![PidDescriptor {
            name: "vin-ish",
            kind: PollKind::Extended,
            tx_module_id: 0x7E0,
            rx_module_id: 0x7E8,
            pid: 0xF190,
            poll_period: [1; NSTATES],
        }];
        let ctx = PollContext::default();

        let sent = poller
            .send_next(&list, &ctx, |_f| Ok(()))
            .unwrap()
            .unwrap();
        assert_eq!(sent.request_id(), 0x7E0);

        let ff = CanFrame::new(0, 0x7E8, &[0x10, 0x14, 0x62, 0xF1, 0x90, 0x31, 0x32, 0x33], false);
        let mut fc_sent = None;
        let (_, payload) = poller
            .handle_frame(&ff, |f| {
                fc_sent = Some(f);
                Ok(())
            })
            .unwrap()
            .unwrap();
        assert_eq!(payload, vec![0x90, 0x31, 0x32, 0x33]);
        let fc = fc_sent.unwrap();
        assert_eq!(fc.id, 0x7E0);
        assert_eq!(fc.payload(), &FLOW_CONTROL_FRAME[..]);

        let cf1 = CanFrame::new(0, 0x7E8, &[0x21, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A], false);
        let (_, payload) = poller.handle_frame(&cf1, |_| Ok(())).unwrap().unwrap();
        assert_eq!(payload, vec![0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A]);
        assert_eq!(poller.state(), PollState::AwaitingResponse);

        let cf2 = CanFrame::new(0, 0x7E8, &[0x22, 0x3B, 0x3C, 0x3D, 0x3E, 0x3F, 0x40, 0x00], false);
        let (_, payload) = poller.handle_frame(&cf2, |_| Ok(())).unwrap().unwrap();
        assert_eq!(payload, vec![0x3B, 0x3C, 0x3D, 0x3E, 0x3F, 0x40, 0x00]);
        assert_eq!(poller.state(), PollState::Done);
    }

    #[test]
    fn state_change_resets_cursor_and_counter() {
        let mut poller = Poller::new();
        let list = pid_list();
        let ctx = PollContext::default();
        for _ in 0..5 {
            poller.send_next(&list, &ctx, |_f| Ok(())).unwrap();
        }
        assert!(poller.tick_counter() > 0);
        poller.reset_on_state_change();
        assert_eq!(poller.tick_counter(), 0);
        assert_eq!(poller.state(), PollState::Idle);
    }
}

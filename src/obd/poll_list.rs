//! Poll-list descriptors and the send-side cursor/eligibility state machine
//!
//! One PID is polled per tick. The cursor walks the list in order, skipping
//! entries whose eligibility predicate returns false for the current poll
//! state, and wraps back to the start once it reaches the end of the list,
//! advancing the poller's own tick counter (mod 3600) on every wrap.

/// Number of distinct poll states a driver can select between (e.g. off,
/// parked, driving, charging)
pub const NSTATES: usize = 4;

/// Current poll state, as chosen by the active driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollContext {
    pub state: usize,
}

impl PollContext {
    pub fn new(state: usize) -> Self {
        Self { state }
    }
}

/// State of one outstanding poll request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No request currently outstanding
    Idle,
    /// Request sent, awaiting a response
    AwaitingResponse,
    /// A response was received and decoded
    Done,
    /// The response timed out before arriving
    TimedOut,
}

/// Which OBD-II/UDS service a poll entry targets, and the resulting frame shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    /// Mode 0x01, show current data
    Current,
    /// Mode 0x02, freeze frame data
    Freeze,
    /// Mode 0x03, session/diagnostic data
    Session,
    /// Mode 0x09, vehicle information (may reassemble across multiple frames)
    VehicleInfo,
    /// Mode 0x21, manufacturer-specific group (may reassemble across multiple frames)
    Group,
    /// Mode 0x22, 16-bit PID (`ReadDataByIdentifier`-style extended addressing)
    Extended,
}

impl PollKind {
    /// The OBD-II/UDS service/mode byte this kind requests with
    pub fn mode(&self) -> u8 {
        match self {
            PollKind::Current => 0x01,
            PollKind::Freeze => 0x02,
            PollKind::Session => 0x03,
            PollKind::VehicleInfo => 0x09,
            PollKind::Group => 0x21,
            PollKind::Extended => 0x22,
        }
    }

    /// Whether this kind addresses a 16-bit PID
    pub fn is_extended(&self) -> bool {
        matches!(self, PollKind::Extended)
    }
}

/// A single PID to poll: which module to address, which service/PID, and how
/// often it is eligible to be sent in each poll state.
#[derive(Debug, Clone, Copy)]
pub struct PidDescriptor {
    pub name: &'static str,
    pub kind: PollKind,
    /// Arbitration ID to transmit the request on when unicasting (ignored,
    /// and `0x7DF` used instead, when `rx_module_id == 0`)
    pub tx_module_id: u16,
    /// Arbitration ID to listen for the response on; `0` means broadcast
    /// addressing (`0x7DF` request, `0x7E8..=0x7EF` response range)
    pub rx_module_id: u16,
    pub pid: u16,
    /// Poll period in ticks per poll state; `0` means never eligible in that state
    pub poll_period: [u32; NSTATES],
}

impl PidDescriptor {
    /// Whether this entry is due to be sent given `tick_counter` and `ctx.state`
    pub fn is_eligible(&self, ctx: &PollContext, tick_counter: u32) -> bool {
        let period = self.poll_period[ctx.state.min(NSTATES - 1)];
        period > 0 && tick_counter % period == 0
    }

    /// Arbitration ID the request is transmitted on
    pub fn request_id(&self) -> u32 {
        if self.rx_module_id != 0 {
            self.tx_module_id as u32
        } else {
            crate::can::OBD_REQUEST_ID
        }
    }

    /// Whether `frame_id` is a response this entry's outstanding request is
    /// waiting on
    pub fn response_matches(&self, frame_id: u32) -> bool {
        if self.rx_module_id != 0 {
            frame_id == self.rx_module_id as u32
        } else {
            crate::can::is_obd_response(frame_id)
        }
    }

    /// Arbitration ID a flow-control frame is addressed to, given the id the
    /// first frame arrived on
    pub fn flow_control_target(&self, response_frame_id: u32) -> u32 {
        if self.rx_module_id != 0 {
            self.tx_module_id as u32
        } else {
            crate::can::responder_id_for(response_frame_id)
        }
    }
}

/// Send-side cursor over a poll list: advances one entry per invocation,
/// wrapping to the head (and bumping the poller's own tick counter, mod 3600)
/// whenever it runs off the end.
#[derive(Debug, Default)]
pub struct PollCursor {
    position: usize,
    tick_counter: u32,
}

impl PollCursor {
    pub fn new() -> Self {
        Self {
            position: 0,
            tick_counter: 0,
        }
    }

    /// The poller's own tick counter (mod 3600), independent of the tick
    /// engine's master tick
    pub fn tick_counter(&self) -> u32 {
        self.tick_counter
    }

    fn wrap_if_needed(&mut self, len: usize) {
        if self.position >= len {
            self.position = 0;
            self.tick_counter = (self.tick_counter + 1) % 3600;
        }
    }

    /// Scan at most one full lap of `list` for the next eligible entry,
    /// advancing the cursor past whatever it finds (or visits, if nothing is
    /// eligible). Returns the index of the entry to send, if any.
    pub fn next_eligible(&mut self, list: &[PidDescriptor], ctx: &PollContext) -> Option<usize> {
        if list.is_empty() {
            return None;
        }
        for _ in 0..list.len() {
            self.wrap_if_needed(list.len());
            let idx = self.position;
            self.position += 1;
            if list[idx].is_eligible(ctx, self.tick_counter) {
                return Some(idx);
            }
        }
        self.wrap_if_needed(list.len());
        None
    }
}

//! Per-WebSocket-session retry/backoff state machine and DSP state.
//!
//! One [`SessionState`] is created per accepted WebSocket connection and
//! discarded when it closes; nothing here persists across sessions.

use std::time::{Duration, Instant};

use crate::conditioner::Conditioner;
use crate::protocol_constants::{
    RESET_HELPER_TRIGGER_FAIL_COUNT, RETRY_BACKOFF_BASE_SECS, RETRY_BACKOFF_CAP_SECS,
    RETRY_MAX_ATTEMPTS,
};
use crate::rtsp::ConnectErrorKind;

/// Outcome of feeding one audio frame through [`SessionState::on_frame_arrival`].
#[derive(Debug, PartialEq, Eq)]
pub enum FrameDecision {
    /// Backchannel already connected; caller should send the frame.
    Send,
    /// Drop the frame silently: either given up or still backing off.
    Drop,
    /// Backchannel not connected and no attempt in flight; caller should
    /// announce `backchannel_connecting` and attempt `connect`.
    AttemptConnect,
}

/// Result of [`SessionState::on_connect_result`], telling the caller what
/// status message (if any) to send and whether to run the reset helper.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Connect succeeded; send `backchannel_ready`.
    Ready,
    /// Connect failed; send `backchannel_failed` with this retry delay.
    Failed { retry_in_secs: u64 },
    /// Connect failed for the fifth time; send `backchannel_unavailable`.
    GaveUp,
    /// Connect failed and this is the specific failure that should trigger
    /// the upstream-reset helper (3rd failure, kind `DESCRIBE_404`, not yet
    /// attempted this session).
    FailedTriggerReset { retry_in_secs: u64 },
}

/// Per-session DSP + retry-state controller.
pub struct SessionState {
    pub conditioner: Conditioner,
    pub connected: bool,
    fail_count: u32,
    backoff_until: Option<Instant>,
    reset_attempted: bool,
    gave_up: bool,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            conditioner: Conditioner::new(),
            connected: false,
            fail_count: 0,
            backoff_until: None,
            reset_attempted: false,
            gave_up: false,
        }
    }

    /// Whether this session has exhausted its retry budget.
    #[must_use]
    pub fn gave_up(&self) -> bool {
        self.gave_up
    }

    /// Decides what to do when an audio frame arrives and the backchannel is
    /// not currently connected.
    ///
    /// Only the very first attempt (`fail_count == 0`) is triggered by frame
    /// arrival; later retries are driven by [`SessionState::backoff_deadline`]
    /// on the caller's own timer, so a retry due after `backoff_until` elapses
    /// is dropped here rather than re-attempted inline (§4.5: `backchannel_connecting`
    /// fires only on the fresh, fail_count == 0 trigger).
    pub fn on_frame_arrival(&self) -> FrameDecision {
        if self.connected {
            return FrameDecision::Send;
        }
        if self.gave_up {
            return FrameDecision::Drop;
        }
        if self.backoff_until.is_some() {
            return FrameDecision::Drop;
        }
        if self.fail_count == 0 {
            return FrameDecision::AttemptConnect;
        }
        FrameDecision::Drop
    }

    /// Deadline the caller should sleep until to drive the next retry attempt,
    /// or `None` if no retry is pending (connected, given up, or never having
    /// failed yet).
    #[must_use]
    pub fn backoff_deadline(&self) -> Option<Instant> {
        if self.connected || self.gave_up {
            None
        } else {
            self.backoff_until
        }
    }

    /// Records a successful `connect`: resets the failure streak.
    ///
    /// `reset_attempted` deliberately survives a successful reconnect within
    /// the same WebSocket session -- the upstream-reset helper runs at most
    /// once per session (Testable Property 7), not once per failure streak.
    pub fn on_connect_success(&mut self) -> ConnectOutcome {
        self.connected = true;
        self.fail_count = 0;
        self.backoff_until = None;
        ConnectOutcome::Ready
    }

    /// Records a failed `connect` with the given failure kind, applying the
    /// backoff table from the retry/backoff controller.
    pub fn on_connect_failure(&mut self, kind: ConnectErrorKind, now: Instant) -> ConnectOutcome {
        self.connected = false;

        if self.fail_count >= RETRY_MAX_ATTEMPTS {
            self.gave_up = true;
            return ConnectOutcome::GaveUp;
        }

        self.fail_count += 1;

        if self.fail_count >= RETRY_MAX_ATTEMPTS {
            self.gave_up = true;
            return ConnectOutcome::GaveUp;
        }

        let delay_secs = (RETRY_BACKOFF_BASE_SECS * 2u64.pow(self.fail_count - 1))
            .min(RETRY_BACKOFF_CAP_SECS);
        self.backoff_until = Some(now + Duration::from_secs(delay_secs));

        let should_reset = kind == ConnectErrorKind::Describe404
            && self.fail_count == RESET_HELPER_TRIGGER_FAIL_COUNT
            && !self.reset_attempted;

        if should_reset {
            self.reset_attempted = true;
            ConnectOutcome::FailedTriggerReset {
                retry_in_secs: delay_secs,
            }
        } else {
            ConnectOutcome::Failed {
                retry_in_secs: delay_secs,
            }
        }
    }

    /// Called when the WebSocket closes; backchannel teardown is handled by
    /// the caller holding the `BackchannelSession`, not by this struct.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_with_no_backchannel_requests_connect() {
        let state = SessionState::new();
        assert_eq!(state.on_frame_arrival(), FrameDecision::AttemptConnect);
    }

    #[test]
    fn connected_session_sends_frames() {
        let mut state = SessionState::new();
        state.on_connect_success();
        assert_eq!(state.on_frame_arrival(), FrameDecision::Send);
    }

    #[test]
    fn frame_during_backoff_window_is_dropped() {
        let mut state = SessionState::new();
        let now = Instant::now();
        state.on_connect_failure(ConnectErrorKind::DescribeOther, now);
        assert_eq!(state.on_frame_arrival(), FrameDecision::Drop);
    }

    #[test]
    fn frame_after_backoff_window_is_still_dropped() {
        // Retries after the first are timer-driven (backoff_deadline), not
        // triggered by frame arrival, even once the backoff window has
        // elapsed -- otherwise backchannel_connecting would be re-sent.
        let mut state = SessionState::new();
        let now = Instant::now();
        state.on_connect_failure(ConnectErrorKind::DescribeOther, now);
        assert_eq!(state.on_frame_arrival(), FrameDecision::Drop);
    }

    #[test]
    fn backoff_deadline_is_set_after_failure_and_cleared_on_success() {
        let mut state = SessionState::new();
        let now = Instant::now();
        assert_eq!(state.backoff_deadline(), None);

        state.on_connect_failure(ConnectErrorKind::DescribeOther, now);
        assert_eq!(state.backoff_deadline(), Some(now + Duration::from_secs(2)));

        state.on_connect_success();
        assert_eq!(state.backoff_deadline(), None);
    }

    #[test]
    fn backoff_deadline_is_none_once_given_up() {
        let mut state = SessionState::new();
        let mut now = Instant::now();
        for _ in 0..RETRY_MAX_ATTEMPTS {
            state.on_connect_failure(ConnectErrorKind::DescribeOther, now);
            now += Duration::from_secs(31);
        }
        assert!(state.gave_up());
        assert_eq!(state.backoff_deadline(), None);
    }

    #[test]
    fn gave_up_session_drops_frames_forever() {
        let mut state = SessionState::new();
        let mut now = Instant::now();
        for _ in 0..RETRY_MAX_ATTEMPTS {
            state.on_connect_failure(ConnectErrorKind::DescribeOther, now);
            now += Duration::from_secs(31);
        }
        assert!(state.gave_up());
        assert_eq!(state.on_frame_arrival(), FrameDecision::Drop);
    }

    #[test]
    fn backoff_delays_follow_exponential_table() {
        let mut state = SessionState::new();
        let now = Instant::now();

        let delays = [2, 4, 8, 16];
        for &expected in &delays {
            match state.on_connect_failure(ConnectErrorKind::DescribeOther, now) {
                ConnectOutcome::Failed { retry_in_secs } => {
                    assert_eq!(retry_in_secs, expected);
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        // Fifth failure -> give up.
        assert_eq!(
            state.on_connect_failure(ConnectErrorKind::DescribeOther, now),
            ConnectOutcome::GaveUp
        );
    }

    #[test]
    fn third_describe_404_triggers_reset_exactly_once() {
        let mut state = SessionState::new();
        let now = Instant::now();

        state.on_connect_failure(ConnectErrorKind::Describe404, now);
        state.on_connect_failure(ConnectErrorKind::Describe404, now);
        let third = state.on_connect_failure(ConnectErrorKind::Describe404, now);

        assert!(matches!(third, ConnectOutcome::FailedTriggerReset { .. }));

        // A successful reconnect followed by a fresh 3-failure streak must
        // NOT re-trigger the reset helper: it runs at most once per session.
        state.on_connect_success();
        state.on_connect_failure(ConnectErrorKind::Describe404, now);
        state.on_connect_failure(ConnectErrorKind::Describe404, now);
        let retriggered = state.on_connect_failure(ConnectErrorKind::Describe404, now);
        assert!(matches!(retriggered, ConnectOutcome::Failed { .. }));
    }

    #[test]
    fn connect_success_clears_retry_state() {
        let mut state = SessionState::new();
        let now = Instant::now();
        state.on_connect_failure(ConnectErrorKind::DescribeOther, now);
        state.on_connect_success();
        assert!(!state.gave_up());
        assert_eq!(state.on_frame_arrival(), FrameDecision::Send);
    }
}

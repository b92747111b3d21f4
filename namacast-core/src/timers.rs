//! Timer scheduling decisions for the program engine.
//!
//! Each engine timer occupies one slot. On every state transition the engine
//! evaluates a pure decision function per slot against the previous and next
//! state, then applies the returned [`TimerAction`] while still holding the
//! state write lock, so a transition and its timer changes land atomically.

use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::program::{ProgramState, ProgramStatus};
use crate::time::delay_until;

/// Padding added after a status boundary before the confirming refresh, so
/// the provider has settled into the new status by the time we ask.
pub const STATUS_REFRESH_PADDING_SECS: i64 = 3;

/// How often statistics are polled while a program is on air.
pub const STATISTICS_INTERVAL: Duration = Duration::from_secs(60);

/// How long before the scheduled end the auto-extension fires.
pub const AUTO_EXTENSION_LEAD_SECS: i64 = 300;

/// What to do with a timer slot after a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Keep whatever is scheduled
    Leave,
    /// Abort anything scheduled
    Cancel,
    /// Abort anything scheduled and arm a new deadline
    Arm(Duration),
}

/// The next status boundary the program will cross, if any.
///
/// A reserved program next opens its test segment, a test program next goes
/// on air, and an on-air program next ends. An ended program has nothing
/// left to cross.
#[must_use]
pub fn status_boundary(state: &ProgramState) -> Option<i64> {
    if !state.has_program() {
        return None;
    }
    match state.status {
        ProgramStatus::Reserved => Some(state.test_start_time),
        ProgramStatus::Test => Some(state.start_time),
        ProgramStatus::OnAir => Some(state.end_time),
        ProgramStatus::End => None,
    }
}

/// Decide the status refresh timer after a transition.
///
/// The timer fires shortly after the next status boundary to pick up the
/// provider-side phase change. It is left alone when neither the status nor
/// the boundary moved, so unrelated transitions (statistics, metadata) do
/// not reset a pending refresh.
#[must_use]
pub fn refresh_timer_action(prev: &ProgramState, next: &ProgramState, now: i64) -> TimerAction {
    let prev_boundary = status_boundary(prev);
    let next_boundary = status_boundary(next);

    if prev.status == next.status && prev_boundary == next_boundary {
        return TimerAction::Leave;
    }

    match next_boundary {
        Some(boundary) => {
            TimerAction::Arm(delay_until(boundary + STATUS_REFRESH_PADDING_SECS, now))
        }
        None => TimerAction::Cancel,
    }
}

/// Decide the statistics polling timer after a transition.
///
/// Polling runs only while on air. Arming starts a fresh polling loop whose
/// first poll is immediate; transitions that keep the same program on air
/// leave the running loop untouched.
#[must_use]
pub fn statistics_timer_action(prev: &ProgramState, next: &ProgramState) -> TimerAction {
    if next.status != ProgramStatus::OnAir {
        return TimerAction::Cancel;
    }
    if prev.status != ProgramStatus::OnAir || prev.program_id != next.program_id {
        return TimerAction::Arm(Duration::ZERO);
    }
    TimerAction::Leave
}

fn should_auto_extend(state: &ProgramState) -> bool {
    state.auto_extension_enabled && state.is_extendable()
}

/// Decide the auto-extension timer after a transition.
///
/// While auto-extension applies, the timer targets five minutes before the
/// scheduled end, and follows the end time as extensions move it.
#[must_use]
pub fn extension_timer_action(prev: &ProgramState, next: &ProgramState, now: i64) -> TimerAction {
    match (should_auto_extend(prev), should_auto_extend(next)) {
        (false, true) => TimerAction::Arm(delay_until(
            next.end_time - AUTO_EXTENSION_LEAD_SECS,
            now,
        )),
        (true, true) if prev.end_time != next.end_time => TimerAction::Arm(delay_until(
            next.end_time - AUTO_EXTENSION_LEAD_SECS,
            now,
        )),
        (true, false) => TimerAction::Cancel,
        _ => TimerAction::Leave,
    }
}

/// Holder for one scheduled timer task.
///
/// Arming aborts the previous task before storing the new handle, so at most
/// one task per slot is ever live.
#[derive(Debug, Default)]
pub struct TimerSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerSlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the scheduled task, aborting any previous one.
    pub fn arm(&self, handle: JoinHandle<()>) {
        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Abort the scheduled task, if any.
    pub fn cancel(&self) {
        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.take() {
            previous.abort();
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(status: ProgramStatus) -> ProgramState {
        ProgramState {
            program_id: "lv100".to_string(),
            status,
            test_start_time: 1000,
            start_time: 1060,
            end_time: 2860,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_boundary_per_phase() {
        assert_eq!(status_boundary(&state(ProgramStatus::Reserved)), Some(1000));
        assert_eq!(status_boundary(&state(ProgramStatus::Test)), Some(1060));
        assert_eq!(status_boundary(&state(ProgramStatus::OnAir)), Some(2860));
        assert_eq!(status_boundary(&state(ProgramStatus::End)), None);
    }

    #[test]
    fn test_status_boundary_no_program() {
        assert_eq!(status_boundary(&ProgramState::default()), None);
    }

    #[test]
    fn test_refresh_unchanged_state_leaves_timer() {
        let s = state(ProgramStatus::Test);
        assert_eq!(refresh_timer_action(&s, &s, 500), TimerAction::Leave);
    }

    #[test]
    fn test_refresh_statistics_only_transition_leaves_timer() {
        let prev = state(ProgramStatus::OnAir);
        let next = ProgramState {
            viewers: 10,
            comments: 3,
            ..prev.clone()
        };
        assert_eq!(refresh_timer_action(&prev, &next, 1100), TimerAction::Leave);
    }

    #[test]
    fn test_refresh_arms_padded_boundary() {
        let prev = state(ProgramStatus::Reserved);
        let next = state(ProgramStatus::Test);
        // Test phase ends at start_time 1060; padded target is 1063.
        assert_eq!(
            refresh_timer_action(&prev, &next, 1060),
            TimerAction::Arm(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_refresh_past_boundary_fires_immediately() {
        let prev = state(ProgramStatus::Test);
        let next = state(ProgramStatus::OnAir);
        assert_eq!(
            refresh_timer_action(&prev, &next, 5000),
            TimerAction::Arm(Duration::ZERO)
        );
    }

    #[test]
    fn test_refresh_end_cancels() {
        let prev = state(ProgramStatus::OnAir);
        let next = state(ProgramStatus::End);
        assert_eq!(refresh_timer_action(&prev, &next, 2900), TimerAction::Cancel);
    }

    #[test]
    fn test_refresh_rearms_when_boundary_moves() {
        let prev = state(ProgramStatus::OnAir);
        let next = ProgramState {
            end_time: prev.end_time + 1800,
            ..prev.clone()
        };
        assert_eq!(
            refresh_timer_action(&prev, &next, 2000),
            TimerAction::Arm(Duration::from_secs(
                u64::try_from(next.end_time + 3 - 2000).unwrap()
            ))
        );
    }

    #[test]
    fn test_statistics_arms_on_going_live() {
        let prev = state(ProgramStatus::Test);
        let next = state(ProgramStatus::OnAir);
        assert_eq!(
            statistics_timer_action(&prev, &next),
            TimerAction::Arm(Duration::ZERO)
        );
    }

    #[test]
    fn test_statistics_leaves_while_on_air() {
        let prev = state(ProgramStatus::OnAir);
        let next = ProgramState {
            end_time: prev.end_time + 1800,
            ..prev.clone()
        };
        assert_eq!(statistics_timer_action(&prev, &next), TimerAction::Leave);
    }

    #[test]
    fn test_statistics_restarts_on_program_change() {
        let prev = state(ProgramStatus::OnAir);
        let next = ProgramState {
            program_id: "lv200".to_string(),
            ..prev.clone()
        };
        assert_eq!(
            statistics_timer_action(&prev, &next),
            TimerAction::Arm(Duration::ZERO)
        );
    }

    #[test]
    fn test_statistics_cancels_off_air() {
        let prev = state(ProgramStatus::OnAir);
        let next = state(ProgramStatus::End);
        assert_eq!(statistics_timer_action(&prev, &next), TimerAction::Cancel);
    }

    #[test]
    fn test_extension_arms_when_enabled() {
        let prev = state(ProgramStatus::OnAir);
        let next = ProgramState {
            auto_extension_enabled: true,
            ..prev.clone()
        };
        // end_time 2860, lead 300, now 2000.
        assert_eq!(
            extension_timer_action(&prev, &next, 2000),
            TimerAction::Arm(Duration::from_secs(560))
        );
    }

    #[test]
    fn test_extension_follows_moved_end() {
        let prev = ProgramState {
            auto_extension_enabled: true,
            ..state(ProgramStatus::OnAir)
        };
        let next = ProgramState {
            end_time: prev.end_time + 1800,
            ..prev.clone()
        };
        assert_eq!(
            extension_timer_action(&prev, &next, 2000),
            TimerAction::Arm(Duration::from_secs(2360))
        );
    }

    #[test]
    fn test_extension_cancels_when_disabled() {
        let prev = ProgramState {
            auto_extension_enabled: true,
            ..state(ProgramStatus::OnAir)
        };
        let next = ProgramState {
            auto_extension_enabled: false,
            ..prev.clone()
        };
        assert_eq!(extension_timer_action(&prev, &next, 2000), TimerAction::Cancel);
    }

    #[test]
    fn test_extension_cancels_at_length_limit() {
        let prev = ProgramState {
            auto_extension_enabled: true,
            ..state(ProgramStatus::OnAir)
        };
        let next = ProgramState {
            end_time: prev.start_time + crate::program::MAX_USER_PROGRAM_SECS,
            ..prev.clone()
        };
        assert_eq!(extension_timer_action(&prev, &next, 2000), TimerAction::Cancel);
    }

    #[test]
    fn test_extension_idle_when_never_applicable() {
        let prev = state(ProgramStatus::Test);
        let next = state(ProgramStatus::OnAir);
        // Auto-extension disabled throughout.
        assert_eq!(extension_timer_action(&prev, &next, 1100), TimerAction::Leave);
    }
}

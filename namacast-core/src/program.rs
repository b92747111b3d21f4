//! Broadcast program state and schedule entries.

use serde::{Deserialize, Serialize};

use crate::api::{CommunityDetail, ProgramDetail};

/// Maximum total duration of a user program in seconds (6 hours).
///
/// Programs at or beyond this total length cannot be extended further.
pub const MAX_USER_PROGRAM_SECS: i64 = 6 * 60 * 60;

/// Group ID prefix identifying user-community programs.
pub const USER_PROGRAM_GROUP_PREFIX: &str = "co";

/// Lifecycle phase of a broadcast program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ProgramStatus {
    /// Scheduled but not yet open
    Reserved,
    /// Open for the broadcaster only (pre-air rehearsal segment)
    Test,
    /// Live to the public
    OnAir,
    /// Finished
    #[default]
    End,
}

impl ProgramStatus {
    /// Get the string identifier used on the wire and in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Test => "test",
            Self::OnAir => "onAir",
            Self::End => "end",
        }
    }
}

impl std::fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where to attach for the program's comment stream.
///
/// Both fields are required before a chat connection can be made; programs
/// briefly expose neither while their rooms are being allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCoordinates {
    /// Message server websocket URL
    pub room_url: String,
    /// Thread identifier within the message server
    pub room_thread_id: String,
}

/// Snapshot of the tracked program and its surrounding context.
///
/// A default instance represents "no program loaded": empty IDs, zeroed
/// counters, and [`ProgramStatus::End`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgramState {
    /// Program identifier (e.g., "lv123456789"); empty when nothing is loaded
    pub program_id: String,
    /// Lifecycle phase
    pub status: ProgramStatus,
    /// Program title
    pub title: String,
    /// Program description (may contain HTML)
    pub description: String,
    /// Community group this program belongs to (e.g., "co1234")
    pub group_id: String,
    /// Community display name
    pub group_name: String,
    /// Community icon URL
    pub group_icon_url: String,
    /// Unix time the program went (or will go) on air
    pub start_time: i64,
    /// Unix time the program ends (moves forward on extension)
    pub end_time: i64,
    /// Unix time the test segment opens
    pub test_start_time: i64,
    /// Cumulative viewer count
    pub viewers: i64,
    /// Cumulative comment count
    pub comments: i64,
    /// Advertisement points earned
    pub ad_points: i64,
    /// Gift points earned
    pub gift_points: i64,
    /// Whether the engine should extend the program as it nears its end
    pub auto_extension_enabled: bool,
    /// Comment stream attachment point, when the provider has allocated one
    pub room: Option<ConnectionCoordinates>,
}

impl ProgramState {
    /// Whether a program is currently loaded.
    #[must_use]
    pub fn has_program(&self) -> bool {
        !self.program_id.is_empty()
    }

    /// Whether the program can be extended right now.
    ///
    /// Only an on-air program strictly under the six-hour total length
    /// qualifies.
    #[must_use]
    pub fn is_extendable(&self) -> bool {
        self.status == ProgramStatus::OnAir
            && self.end_time.saturating_sub(self.start_time) < MAX_USER_PROGRAM_SECS
    }

    /// Merge freshly fetched program details, leaving statistics and the
    /// extension toggle untouched.
    pub fn apply_detail(&mut self, detail: &ProgramDetail) {
        self.program_id.clone_from(&detail.program_id);
        self.status = detail.status;
        self.title.clone_from(&detail.title);
        self.description.clone_from(&detail.description);
        self.group_id.clone_from(&detail.group_id);
        self.start_time = detail.start_time;
        self.end_time = detail.end_time;
        self.test_start_time = detail.test_start_time;
        self.room.clone_from(&detail.room);
    }

    /// Merge freshly fetched community details.
    pub fn apply_community(&mut self, community: &CommunityDetail) {
        self.group_name.clone_from(&community.name);
        self.group_icon_url.clone_from(&community.icon_url);
    }
}

/// One row of the provider's upcoming-broadcast listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Program identifier
    pub program_id: String,
    /// Group the program belongs to
    pub group_id: String,
    /// Program title
    pub title: String,
    /// Unix time the test segment opens
    pub test_begin_at: i64,
    /// Unix time the program goes on air
    pub on_air_begin_at: i64,
    /// Unix time the program is scheduled to end
    pub on_air_end_at: i64,
}

impl ScheduleEntry {
    /// Whether this entry is a user-community broadcast (as opposed to a
    /// channel or official one).
    #[must_use]
    pub fn is_user_program(&self) -> bool {
        self.group_id.starts_with(USER_PROGRAM_GROUP_PREFIX)
    }

    /// Whether the program is open at `now`, counting from the start of its
    /// test segment until its scheduled end.
    #[must_use]
    pub fn is_live_at(&self, now: i64) -> bool {
        self.test_begin_at <= now && now < self.on_air_end_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_air_state(start_time: i64, end_time: i64) -> ProgramState {
        ProgramState {
            program_id: "lv100".to_string(),
            status: ProgramStatus::OnAir,
            start_time,
            end_time,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_serde_wire_names() {
        assert_eq!(
            serde_json::to_string(&ProgramStatus::OnAir).unwrap(),
            "\"onAir\""
        );
        assert_eq!(
            serde_json::from_str::<ProgramStatus>("\"reserved\"").unwrap(),
            ProgramStatus::Reserved
        );
        assert_eq!(
            serde_json::from_str::<ProgramStatus>("\"test\"").unwrap(),
            ProgramStatus::Test
        );
        assert_eq!(
            serde_json::from_str::<ProgramStatus>("\"end\"").unwrap(),
            ProgramStatus::End
        );
    }

    #[test]
    fn test_default_state_has_no_program() {
        let state = ProgramState::default();
        assert!(!state.has_program());
        assert_eq!(state.status, ProgramStatus::End);
        assert!(state.room.is_none());
    }

    #[test]
    fn test_is_extendable_under_limit() {
        let state = on_air_state(1000, 1000 + MAX_USER_PROGRAM_SECS - 1);
        assert!(state.is_extendable());
    }

    #[test]
    fn test_is_extendable_at_limit() {
        let state = on_air_state(1000, 1000 + MAX_USER_PROGRAM_SECS);
        assert!(!state.is_extendable());
    }

    #[test]
    fn test_is_extendable_requires_on_air() {
        let mut state = on_air_state(1000, 2000);
        state.status = ProgramStatus::Test;
        assert!(!state.is_extendable());
        state.status = ProgramStatus::End;
        assert!(!state.is_extendable());
    }

    #[test]
    fn test_apply_detail_preserves_statistics() {
        let mut state = ProgramState {
            viewers: 42,
            comments: 7,
            auto_extension_enabled: true,
            ..Default::default()
        };
        let detail = ProgramDetail {
            program_id: "lv100".to_string(),
            status: ProgramStatus::Test,
            title: "morning stream".to_string(),
            description: String::new(),
            group_id: "co55".to_string(),
            start_time: 200,
            end_time: 2000,
            test_start_time: 100,
            room: Some(ConnectionCoordinates {
                room_url: "wss://msg.example/room".to_string(),
                room_thread_id: "165".to_string(),
            }),
        };

        state.apply_detail(&detail);

        assert_eq!(state.program_id, "lv100");
        assert_eq!(state.status, ProgramStatus::Test);
        assert_eq!(state.title, "morning stream");
        assert_eq!(state.viewers, 42);
        assert_eq!(state.comments, 7);
        assert!(state.auto_extension_enabled);
        assert!(state.room.is_some());
    }

    #[test]
    fn test_schedule_entry_user_program() {
        let entry = ScheduleEntry {
            program_id: "lv1".to_string(),
            group_id: "co123".to_string(),
            title: String::new(),
            test_begin_at: 0,
            on_air_begin_at: 0,
            on_air_end_at: 0,
        };
        assert!(entry.is_user_program());

        let channel = ScheduleEntry {
            group_id: "ch123".to_string(),
            ..entry
        };
        assert!(!channel.is_user_program());
    }

    #[test]
    fn test_schedule_entry_live_window() {
        let entry = ScheduleEntry {
            program_id: "lv1".to_string(),
            group_id: "co123".to_string(),
            title: String::new(),
            test_begin_at: 100,
            on_air_begin_at: 200,
            on_air_end_at: 500,
        };
        assert!(!entry.is_live_at(99));
        assert!(entry.is_live_at(100));
        assert!(entry.is_live_at(499));
        assert!(!entry.is_live_at(500));
    }
}

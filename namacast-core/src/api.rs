//! Broadcast provider adapter trait and its result types.

use async_trait::async_trait;

use crate::error::Result;
use crate::program::{ConnectionCoordinates, ProgramStatus, ScheduleEntry};

/// Result of asking the provider to create a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new reservation was created
    Created,
    /// The provider rejected the request because a program already exists
    AlreadyExists,
}

/// Full details of one program, as fetched from the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDetail {
    /// Program identifier
    pub program_id: String,
    /// Lifecycle phase
    pub status: ProgramStatus,
    /// Program title
    pub title: String,
    /// Program description
    pub description: String,
    /// Group the program belongs to
    pub group_id: String,
    /// Unix time the program goes (or went) on air
    pub start_time: i64,
    /// Unix time the program ends
    pub end_time: i64,
    /// Unix time the test segment opens
    pub test_start_time: i64,
    /// Comment stream attachment point, once allocated
    pub room: Option<ConnectionCoordinates>,
}

/// Community profile details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityDetail {
    /// Community display name
    pub name: String,
    /// Community icon URL
    pub icon_url: String,
}

/// Times reported by the provider when a program is put on air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramTimes {
    /// Unix time the program went on air
    pub start_time: i64,
    /// Unix time the program will end
    pub end_time: i64,
}

/// End time reported by the provider when a program is ended or extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndTime {
    /// Unix time the program ends
    pub end_time: i64,
}

/// Live audience statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveStatistics {
    /// Cumulative viewer count
    pub viewers: i64,
    /// Cumulative comment count
    pub comments: i64,
}

/// Advertisement statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdStatistics {
    /// Advertisement points earned
    pub ad_points: i64,
    /// Gift points earned
    pub gift_points: i64,
}

/// A broadcaster-authored comment to publish on the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorComment {
    /// Comment body
    pub text: String,
    /// Display name shown alongside the comment
    pub name: Option<String>,
    /// Whether the comment stays pinned on screen
    pub is_permanent: bool,
}

impl OperatorComment {
    /// Create a plain, unpinned operator comment.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            name: None,
            is_permanent: false,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Keep the comment pinned on screen.
    #[must_use]
    pub const fn permanent(mut self) -> Self {
        self.is_permanent = true;
        self
    }
}

/// Trait for broadcast providers that manage program lifecycles.
///
/// Implementations talk to a live-streaming service on behalf of an
/// authenticated broadcaster. Methods map one-to-one onto provider endpoints;
/// failures propagate to the caller.
#[async_trait]
pub trait BroadcastApi: Send + Sync {
    /// Reserve a new program slot for the account.
    async fn create_program(&self) -> Result<CreateOutcome>;

    /// List the account's upcoming and in-progress broadcasts.
    async fn fetch_schedules(&self) -> Result<Vec<ScheduleEntry>>;

    /// Fetch full details for one program.
    async fn fetch_program(&self, program_id: &str) -> Result<ProgramDetail>;

    /// Fetch the profile of a community group.
    async fn fetch_community(&self, group_id: &str) -> Result<CommunityDetail>;

    /// Push locally staged edits of the program's metadata to the provider.
    async fn edit_program(&self, program_id: &str) -> Result<()>;

    /// Put the program on air.
    async fn start_program(&self, program_id: &str) -> Result<ProgramTimes>;

    /// End the program.
    async fn end_program(&self, program_id: &str) -> Result<EndTime>;

    /// Extend the program by the provider's standard increment.
    async fn extend_program(&self, program_id: &str) -> Result<EndTime>;

    /// Fetch live audience statistics.
    async fn fetch_statistics(&self, program_id: &str) -> Result<LiveStatistics>;

    /// Fetch advertisement statistics.
    async fn fetch_ad_statistics(&self, program_id: &str) -> Result<AdStatistics>;

    /// Publish a broadcaster comment on the program.
    async fn send_operator_comment(&self, program_id: &str, comment: &OperatorComment)
        -> Result<()>;
}

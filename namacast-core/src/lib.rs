pub mod api;
pub mod chat;
pub mod comments;
pub mod config;
pub mod engine;
pub mod error;
pub mod paths;
pub mod program;
pub mod schedule;
pub mod time;
pub mod timers;
pub mod transport;

pub use api::{
    AdStatistics, BroadcastApi, CommunityDetail, CreateOutcome, EndTime, LiveStatistics,
    OperatorComment, ProgramDetail, ProgramTimes,
};
pub use chat::{
    ChatClassifier, ChatKind, ChatPayload, ChatValue, RawEvent, SyntheticNotice, ThreadResult,
    WrappedChat, DISCONNECT_COMMAND,
};
pub use comments::{ChatLog, CommentEngine};
pub use config::{ApiConfig, Config, SessionConfig};
pub use engine::{ProgramEngine, ProgramEvent};
pub use error::{CoreError, Result};
pub use paths::{config_dir, config_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME};
pub use program::{ConnectionCoordinates, ProgramState, ProgramStatus, ScheduleEntry};
pub use schedule::select_program;
pub use transport::{ChatConnection, ChatTransport};

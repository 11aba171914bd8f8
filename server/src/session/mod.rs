mod artifacts;
mod state;
mod store;

pub use artifacts::{Artifact, ArtifactKind, ArtifactManager};
pub use state::{
    Session, SessionId, SessionState, SessionSummary, ViewState, generate_session_id,
    millis_to_datetime, now_millis,
};
pub use store::{SessionConfig, SessionError, SessionInfo, SessionStore};

pub mod logger;
pub mod middleware;
pub mod test_utils;

pub use crewbot_core::recording::*;
pub use logger::{new_event, RecordingLogger};
pub use middleware::RecordingMiddleware;

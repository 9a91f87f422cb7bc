pub mod load;
pub mod save;
pub mod types;

pub use types::{Config, FrameVideoSettings, Language, MAX_RECENT_PATHS, UserSettings};

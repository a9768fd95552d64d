mod action;
mod attention;
mod focus;
mod settings;

pub use action::DecisionAction;
pub use attention::{
    AttentionBatch, AudioPlayEvent, ImageViewEvent, TextReadEvent, UrlAttention, VideoWatchEvent,
    VisitEvent,
};
pub use focus::{merge_keywords, Focus};
pub use settings::UserSettings;

mod app_state;
mod settings;

pub use app_state::AppState;
pub use settings::{Settings, DEFAULT_INSTANCE_NAME, RAW_CONTENT_BASE};

mod health;
mod metrics;
mod notes;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use notes::{create_note, delete_note, get_note, list_notes, update_note};

use dashmap::DashMap;

use crate::config::{FailPolicy, RateScope};
use crate::models::Note;
use crate::rate_limit::AdmissionController;

// app's shared state
pub struct AppState {
    pub notes: DashMap<String, Note>, // id -> Note
    pub admission: AdmissionController,
    pub rate_scope: RateScope,
    pub fail_policy: FailPolicy,
}

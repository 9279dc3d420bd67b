use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Note document. Wire field names match the bundled client, which still
// speaks the document-database JSON shape (_id, camelCase timestamps).
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Note {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

// Create payload - fields are optional so missing ones become a 400
// with a message instead of a body-parse rejection
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

// Update payload - partial, absent fields keep their current value
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UpdateNoteRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

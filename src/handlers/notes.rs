use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics::NOTES_COUNT;
use crate::models::{CreateNoteRequest, Note, UpdateNoteRequest};
use crate::state::AppState;

// GET /api/notes - newest first
pub async fn list_notes(State(state): State<Arc<AppState>>) -> Json<Vec<Note>> {
    let mut notes: Vec<Note> = state.notes.iter().map(|entry| entry.value().clone()).collect();
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(notes)
}

// GET /api/notes/{id}
pub async fn get_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Note>, ApiError> {
    state
        .notes
        .get(&id)
        .map(|entry| Json(entry.value().clone()))
        .ok_or(ApiError::NoteNotFound)
}

// POST /api/notes
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let title = payload.title.unwrap_or_default();
    let content = payload.content.unwrap_or_default();
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(ApiError::MissingFields);
    }

    let now = Utc::now();
    let note = Note {
        id: Uuid::new_v4().to_string(),
        title,
        content,
        created_at: now,
        updated_at: now,
    };

    state.notes.insert(note.id.clone(), note.clone());
    NOTES_COUNT.set(state.notes.len() as f64);

    Ok((StatusCode::CREATED, Json(note)))
}

// PUT /api/notes/{id} - partial update, bumps updatedAt
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateNoteRequest>,
) -> Result<Json<Note>, ApiError> {
    let mut entry = state.notes.get_mut(&id).ok_or(ApiError::NoteNotFound)?;

    if let Some(title) = payload.title {
        entry.title = title;
    }
    if let Some(content) = payload.content {
        entry.content = content;
    }
    entry.updated_at = Utc::now();

    Ok(Json(entry.clone()))
}

// DELETE /api/notes/{id}
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.notes.remove(&id).ok_or(ApiError::NoteNotFound)?;
    NOTES_COUNT.set(state.notes.len() as f64);

    Ok(Json(serde_json::json!({
        "message": "Note deleted successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FailPolicy, RateScope};
    use crate::rate_limit::{AdmissionController, RateLimitConfig};
    use crate::store::MemoryBudgetStore;
    use dashmap::DashMap;
    use std::time::Duration;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            notes: DashMap::new(),
            admission: AdmissionController::new(
                Arc::new(MemoryBudgetStore::new()),
                RateLimitConfig {
                    max_tokens: 100,
                    window: Duration::from_secs(60),
                },
            ),
            rate_scope: RateScope::Ip,
            fail_policy: FailPolicy::Closed,
        })
    }

    fn payload(title: &str, content: &str) -> CreateNoteRequest {
        CreateNoteRequest {
            title: Some(title.to_string()),
            content: Some(content.to_string()),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let state = test_state();

        let (status, Json(created)) =
            create_note(State(state.clone()), Json(payload("groceries", "milk, eggs")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.title, "groceries");
        assert_eq!(created.created_at, created.updated_at);

        let Json(fetched) = get_note(State(state), Path(created.id.clone())).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.content, "milk, eggs");
    }

    #[tokio::test]
    async fn create_rejects_blank_fields() {
        let state = test_state();

        let result = create_note(
            State(state.clone()),
            Json(CreateNoteRequest {
                title: Some("only a title".to_string()),
                content: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::MissingFields)));

        let result = create_note(State(state), Json(payload("   ", "body"))).await;
        assert!(matches!(result, Err(ApiError::MissingFields)));
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let state = test_state();

        for i in 0..3 {
            create_note(
                State(state.clone()),
                Json(payload(&format!("note {}", i), "body")),
            )
            .await
            .unwrap();
            // created_at must differ for the ordering to be observable
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let Json(notes) = list_notes(State(state)).await;
        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].title, "note 2");
        assert_eq!(notes[2].title, "note 0");
        assert!(notes[0].created_at >= notes[1].created_at);
    }

    #[tokio::test]
    async fn update_changes_fields_and_bumps_updated_at() {
        let state = test_state();

        let (_, Json(created)) =
            create_note(State(state.clone()), Json(payload("draft", "v1")))
                .await
                .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        let Json(updated) = update_note(
            State(state.clone()),
            Path(created.id.clone()),
            Json(UpdateNoteRequest {
                title: None,
                content: Some("v2".to_string()),
            }),
        )
        .await
        .unwrap();

        // untouched field survives a partial update
        assert_eq!(updated.title, "draft");
        assert_eq!(updated.content, "v2");
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn delete_removes_the_note() {
        let state = test_state();

        let (_, Json(created)) =
            create_note(State(state.clone()), Json(payload("to go", "bye")))
                .await
                .unwrap();

        delete_note(State(state.clone()), Path(created.id.clone()))
            .await
            .unwrap();

        let result = get_note(State(state), Path(created.id)).await;
        assert!(matches!(result, Err(ApiError::NoteNotFound)));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let state = test_state();
        let id = "missing".to_string();

        assert!(matches!(
            get_note(State(state.clone()), Path(id.clone())).await,
            Err(ApiError::NoteNotFound)
        ));
        assert!(matches!(
            update_note(
                State(state.clone()),
                Path(id.clone()),
                Json(UpdateNoteRequest {
                    title: None,
                    content: None
                })
            )
            .await,
            Err(ApiError::NoteNotFound)
        ));
        assert!(matches!(
            delete_note(State(state), Path(id)).await,
            Err(ApiError::NoteNotFound)
        ));
    }
}

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CollectionRequest, CollectionResponse};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub const NAME_MAX_CHARS: usize = 120;

pub fn collection_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_collection))
        .route("/get", get(list_collections))
        .route("/update/:id", put(update_collection))
        .route("/delete/:id", delete(delete_collection))
}

fn validated_name(raw: &str) -> AppResult<&str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Collection name is required".into()));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "Collection name must be less than {NAME_MAX_CHARS} characters"
        )));
    }
    Ok(name)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_collection(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Json(body), _): WithRejection<Json<CollectionRequest>, AppError>,
) -> AppResult<Json<CollectionResponse>> {
    let name = validated_name(&body.name)?;
    let collection = state.collections.create(name).await?;
    info!(collection_id = %collection.id, "collection created");
    Ok(Json(CollectionResponse::one(
        "Collection created successfully",
        collection,
    )))
}

#[instrument(skip_all)]
pub async fn list_collections(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<CollectionResponse>> {
    let collections = state.collections.list().await?;
    Ok(Json(CollectionResponse::many(collections)))
}

#[instrument(skip_all, fields(%id))]
pub async fn update_collection(
    State(state): State<AppState>,
    _user: AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<CollectionRequest>, AppError>,
) -> AppResult<Json<CollectionResponse>> {
    let name = validated_name(&body.name)?;
    let collection = state
        .collections
        .rename(id, name)
        .await?
        .ok_or_else(|| AppError::NotFound("Collection not found".into()))?;
    Ok(Json(CollectionResponse::one(
        "Collection updated successfully",
        collection,
    )))
}

#[instrument(skip_all, fields(%id))]
pub async fn delete_collection(
    State(state): State<AppState>,
    _user: AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<CollectionResponse>> {
    if !state.collections.delete(id).await? {
        return Err(AppError::NotFound("Collection not found".into()));
    }
    info!(collection_id = %id, "collection deleted");
    Ok(Json(CollectionResponse::message(
        "Collection deleted successfully",
    )))
}

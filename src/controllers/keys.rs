use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::keys::{
        AddKeysRequest, KeyService, KeyServiceApi, KeyStatusView, ResetAllResponse,
        UpdateKeyRequest, ValidationResponse,
    },
    error::AppResult,
};

pub struct KeyController {
    key_service: Arc<KeyService>,
}

impl KeyController {
    pub fn new(key_service: Arc<KeyService>) -> Self {
        Self { key_service }
    }

    /// GET /api/keys - Status of every key in the pool
    pub async fn list(State(controller): State<Arc<KeyController>>) -> Json<Vec<KeyStatusView>> {
        Json(controller.key_service.list_statuses().await)
    }

    /// POST /api/keys - Register one or more keys
    pub async fn add(
        State(controller): State<Arc<KeyController>>,
        Json(request): Json<AddKeysRequest>,
    ) -> AppResult<(StatusCode, Json<Vec<KeyStatusView>>)> {
        let added = controller.key_service.add_keys(request).await?;
        Ok((StatusCode::CREATED, Json(added)))
    }

    /// DELETE /api/keys/{id}
    pub async fn remove(
        State(controller): State<Arc<KeyController>>,
        Path(key_id): Path<Uuid>,
    ) -> AppResult<StatusCode> {
        controller.key_service.remove_key(key_id).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    /// PATCH /api/keys/{id} - Enable, disable or relabel
    pub async fn update(
        State(controller): State<Arc<KeyController>>,
        Path(key_id): Path<Uuid>,
        Json(request): Json<UpdateKeyRequest>,
    ) -> AppResult<Json<KeyStatusView>> {
        Ok(Json(controller.key_service.update_key(key_id, request).await?))
    }

    /// POST /api/keys/{id}/validate
    pub async fn validate(
        State(controller): State<Arc<KeyController>>,
        Path(key_id): Path<Uuid>,
    ) -> AppResult<Json<ValidationResponse>> {
        Ok(Json(controller.key_service.validate_key(key_id).await?))
    }

    /// POST /api/keys/{id}/reset
    pub async fn reset(
        State(controller): State<Arc<KeyController>>,
        Path(key_id): Path<Uuid>,
    ) -> AppResult<Json<KeyStatusView>> {
        Ok(Json(controller.key_service.reset_key(key_id).await?))
    }

    /// POST /api/keys/reset - Operator recovery for the whole pool
    pub async fn reset_all(
        State(controller): State<Arc<KeyController>>,
    ) -> AppResult<Json<ResetAllResponse>> {
        Ok(Json(controller.key_service.reset_all().await?))
    }
}

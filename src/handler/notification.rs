use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, put},
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    db::NotificationExt,
    dtos::{
        DEFAULT_NOTIFICATION_LIMIT, NotificationDto, NotificationListResponseDto,
        NotificationQueryDto, PaginationDto, Response, UnreadCountResponseDto, page_and_limit,
    },
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddleware,
};

/// Router for notification endpoints (all behind the auth middleware)
pub fn notification_handler() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", put(mark_all_read))
        .route("/read/{id}", put(mark_read))
        .route("/{id}", delete(delete_notification))
}

fn db_error(context: &str, e: sqlx::Error) -> HttpError {
    tracing::error!("DB error, {}: {}", context, e);
    HttpError::server_error(ErrorMessage::ServerError.to_string())
}

// An id that is not a UUID cannot name one of the caller's notifications.
fn notification_id(raw: &str) -> Result<Uuid, HttpError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| HttpError::not_found(ErrorMessage::NotificationNotFound.to_string()))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn list_notifications(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Query(query): Query<NotificationQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate().map_err(|e| {
        tracing::error!("Invalid notification query: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user_id = jwt.user.id;
    let unread_only = query.unread_only();
    let (page, limit) =
        page_and_limit(query.page.as_deref(), query.limit.as_deref(), DEFAULT_NOTIFICATION_LIMIT);

    let notifications = app_state
        .db_client
        .list_notifications(user_id, unread_only, page, limit)
        .await
        .map_err(|e| db_error("listing notifications", e))?;

    let total = app_state
        .db_client
        .count_notifications(user_id, unread_only)
        .await
        .map_err(|e| db_error("counting notifications", e))?;

    let unread_count = app_state
        .db_client
        .unread_count(user_id)
        .await
        .map_err(|e| db_error("counting unread notifications", e))?;

    Ok(Json(NotificationListResponseDto {
        status: "success".to_string(),
        notifications: NotificationDto::filter_notifications(&notifications),
        pagination: PaginationDto::new(page, limit, total),
        unread_count,
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn unread_count(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let unread_count = app_state
        .db_client
        .unread_count(jwt.user.id)
        .await
        .map_err(|e| db_error("counting unread notifications", e))?;

    Ok(Json(UnreadCountResponseDto {
        status: "success".to_string(),
        unread_count,
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn mark_read(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let id = notification_id(&id)?;

    let found = app_state
        .db_client
        .mark_read(id, jwt.user.id)
        .await
        .map_err(|e| db_error("marking notification read", e))?;

    if !found {
        return Err(HttpError::not_found(
            ErrorMessage::NotificationNotFound.to_string(),
        ));
    }

    tracing::info!(notification_id = %id, "Notification marked as read");
    Ok(Json(Response {
        status: "success",
        message: "Notification marked as read".to_string(),
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn mark_all_read(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let updated = app_state
        .db_client
        .mark_all_read(jwt.user.id)
        .await
        .map_err(|e| db_error("marking all notifications read", e))?;

    tracing::info!(updated, "All notifications marked as read");
    Ok(Json(Response {
        status: "success",
        message: "All notifications marked as read".to_string(),
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn delete_notification(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let id = notification_id(&id)?;

    let found = app_state
        .db_client
        .soft_delete(id, jwt.user.id)
        .await
        .map_err(|e| db_error("deleting notification", e))?;

    if !found {
        return Err(HttpError::not_found(
            ErrorMessage::NotificationNotFound.to_string(),
        ));
    }

    tracing::info!(notification_id = %id, "Notification deleted");
    Ok(Json(Response {
        status: "success",
        message: "Notification deleted successfully".to_string(),
    }))
}

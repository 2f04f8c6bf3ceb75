use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    db::{DonorSearch, ProfileExt},
    dtos::{
        AvailabilityDto, AvailabilityResponseDto, DEFAULT_PAGE_LIMIT, DonorListItemDto,
        DonorListResponseDto, DonorQueryDto, FilterProfileDto, PaginationDto, ProfileInputDto,
        ProfileResponseDto, page_and_limit,
    },
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddleware,
    models::BloodGroup,
};

/// Router for donor profile endpoints (all behind the auth middleware)
pub fn profile_handler() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_or_update_profile))
        .route("/me", get(get_profile))
        .route("/donors", get(list_donors))
        .route("/availability", put(update_availability))
}

/// Create the caller's profile, or replace its contact fields
#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn create_or_update_profile(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<ProfileInputDto>,
) -> Result<impl IntoResponse, HttpError> {
    let body = body.trimmed();
    body.validate().map_err(|e| {
        tracing::error!("Invalid profile input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;
    let fields = body.into_fields().map_err(HttpError::bad_request)?;

    let profile = app_state
        .db_client
        .upsert_profile(jwt.user.id, &fields)
        .await
        .map_err(|e| {
            tracing::error!("DB error, saving profile: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(profile_id = %profile.id, "Profile saved");
    Ok(Json(ProfileResponseDto {
        status: "success".to_string(),
        message: Some("Profile saved successfully".to_string()),
        profile: FilterProfileDto::filter_profile(&profile, Utc::now(), Some(&jwt.user.email)),
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn get_profile(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = app_state
        .db_client
        .get_profile(jwt.user.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting profile: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ProfileNotFound.to_string()))?;

    Ok(Json(ProfileResponseDto {
        status: "success".to_string(),
        message: None,
        profile: FilterProfileDto::filter_profile(&profile, Utc::now(), Some(&jwt.user.email)),
    }))
}

/// Search effectively available donors other than the caller
#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn list_donors(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Query(query): Query<DonorQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate().map_err(|e| {
        tracing::error!("Invalid donor query: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let blood_group = query
        .blood_group
        .as_deref()
        .filter(|group| !group.trim().is_empty())
        .map(str::parse::<BloodGroup>)
        .transpose()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    let city = query
        .city
        .as_deref()
        .map(str::trim)
        .filter(|city| !city.is_empty())
        .map(str::to_string);
    let (page, limit) =
        page_and_limit(query.page.as_deref(), query.limit.as_deref(), DEFAULT_PAGE_LIMIT);

    let search = DonorSearch {
        exclude_user: jwt.user.id,
        blood_group,
        city,
        page,
        limit,
    };
    let now = Utc::now();

    let donors = app_state
        .db_client
        .search_donors(&search, now)
        .await
        .map_err(|e| {
            tracing::error!("DB error, searching donors: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .count_donors(&search, now)
        .await
        .map_err(|e| {
            tracing::error!("DB error, counting donors: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(results = donors.len(), total, "Donor search successful");
    Ok(Json(DonorListResponseDto {
        status: "success".to_string(),
        donors: DonorListItemDto::filter_donors(&donors, now),
        pagination: PaginationDto::new(page, limit, total),
    }))
}

/// Flip the raw availability flag; a running cooldown still applies
#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn update_availability(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<AvailabilityDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid availability input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;
    let is_available = body
        .is_available
        .ok_or_else(|| HttpError::bad_request("isAvailable is required"))?;

    let profile = app_state
        .db_client
        .set_availability(jwt.user.id, is_available)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating availability: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ProfileNotFound.to_string()))?;

    tracing::info!(is_available, "Availability updated");
    Ok(Json(AvailabilityResponseDto {
        status: "success".to_string(),
        message: "Availability updated successfully".to_string(),
        is_available: profile.is_effectively_available(Utc::now()),
    }))
}

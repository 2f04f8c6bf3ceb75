use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    db::{NewBloodRequest, NotificationExt, ProfileExt, RequestDirection, RequestExt},
    domain::{
        LifecycleError,
        request_flow::{RequestAction, check_new_request, plan_transition},
    },
    dtos::{
        BloodRequestDto, DEFAULT_PAGE_LIMIT, PaginationDto, RequestListItemDto,
        RequestListQueryDto, RequestListResponseDto, RequestResponseDto, SendRequestDto,
        page_and_limit,
    },
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddleware,
    models::{BloodRequest, DonorProfile, NotificationData, User},
};

/// Router for blood request endpoints (all behind the auth middleware)
pub fn request_handler() -> Router<AppState> {
    Router::new()
        .route("/send", post(send_request))
        .route("/sent", get(list_sent_requests))
        .route("/received", get(list_received_requests))
        .route("/accept/{id}", put(accept_request))
        .route("/reject/{id}", put(reject_request))
        .route("/complete/{id}", put(complete_request))
}

fn db_error(context: &str, e: sqlx::Error) -> HttpError {
    tracing::error!("DB error, {}: {}", context, e);
    HttpError::server_error(ErrorMessage::ServerError.to_string())
}

/// The user's profile, if any, plus the name other parties see.
/// Falls back to the email address for users without a profile.
///
/// Only called once the request change is stored, so a failed lookup is
/// logged and treated as a missing profile.
async fn party_profile(app_state: &AppState, user: &User) -> (String, Option<DonorProfile>) {
    let profile = match app_state.db_client.get_profile(user.id).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(user_id = %user.id, "DB error, getting profile for notification: {}", e);
            None
        }
    };

    let name = profile
        .as_ref()
        .map(|p| p.name.clone())
        .unwrap_or_else(|| user.email.clone());

    (name, profile)
}

/// Store a notification; a failure here never undoes the change it reports.
async fn notify(app_state: &AppState, user_id: Uuid, data: NotificationData) {
    if let Err(e) = app_state
        .db_client
        .create_notification(user_id, &data)
        .await
    {
        tracing::error!(
            recipient = %user_id,
            request_id = ?data.request_id(),
            "Failed to create notification: {}",
            e
        );
    }
}

/// Send a request to a donor and notify them
#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn send_request(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<SendRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid blood request input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;
    let input = body.parse().map_err(HttpError::bad_request)?;

    let requester_id = jwt.user.id;
    if input.donor_id == requester_id {
        return Err(LifecycleError::SelfRequest.into());
    }

    let donor = app_state
        .db_client
        .get_profile(input.donor_id)
        .await
        .map_err(|e| db_error("getting donor profile", e))?
        .ok_or_else(|| {
            tracing::error!(donor_id = %input.donor_id, "Donor has no profile");
            HttpError::not_found("Donor not found")
        })?;

    let has_pending = app_state
        .db_client
        .has_pending_request(requester_id, input.donor_id)
        .await
        .map_err(|e| db_error("checking pending requests", e))?;

    check_new_request(
        requester_id,
        input.donor_id,
        donor.is_effectively_available(Utc::now()),
        has_pending,
    )?;

    let new_request = NewBloodRequest {
        requester_id,
        donor_id: input.donor_id,
        blood_group: input.blood_group,
        urgency: input.urgency,
        message: input.message,
        hospital_name: input.hospital_name,
        hospital_address: input.hospital_address,
        required_date: input.required_date,
    };

    let request = match app_state.db_client.create_request(&new_request).await {
        Ok(request) => request,
        // lost a race against a concurrent send for the same pair
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, saving request, unique_violation: {}", db_err);
            return Err(LifecycleError::DuplicatePending.into());
        }
        Err(e) => return Err(db_error("saving request", e)),
    };

    let (requester_name, _) = party_profile(&app_state, &jwt.user).await;
    notify(
        &app_state,
        request.donor_id,
        NotificationData::BloodRequest {
            request_id: request.id,
            requester_name,
            blood_group: request.blood_group,
            urgency: request.urgency,
        },
    )
    .await;

    tracing::info!(request_id = %request.id, donor_id = %request.donor_id, "Blood request sent");
    Ok((
        StatusCode::CREATED,
        Json(RequestResponseDto {
            status: "success".to_string(),
            message: "Blood request sent successfully".to_string(),
            request: BloodRequestDto::filter_request(&request),
        }),
    ))
}

async fn list_requests(
    app_state: &AppState,
    user_id: Uuid,
    direction: RequestDirection,
    query: RequestListQueryDto,
) -> Result<RequestListResponseDto, HttpError> {
    query.validate().map_err(|e| {
        tracing::error!("Invalid request list query: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let status = query.status_filter();
    let (page, limit) =
        page_and_limit(query.page.as_deref(), query.limit.as_deref(), DEFAULT_PAGE_LIMIT);

    let rows = app_state
        .db_client
        .list_requests(user_id, direction, status, page, limit)
        .await
        .map_err(|e| db_error("listing requests", e))?;

    let total = app_state
        .db_client
        .count_requests(user_id, direction, status)
        .await
        .map_err(|e| db_error("counting requests", e))?;

    tracing::info!(?direction, results = rows.len(), total, "Request list successful");
    Ok(RequestListResponseDto {
        status: "success".to_string(),
        requests: RequestListItemDto::filter_requests(&rows),
        pagination: PaginationDto::new(page, limit, total),
    })
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn list_sent_requests(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Query(query): Query<RequestListQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    let response = list_requests(&app_state, jwt.user.id, RequestDirection::Sent, query).await?;
    Ok(Json(response))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn list_received_requests(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Query(query): Query<RequestListQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    let response =
        list_requests(&app_state, jwt.user.id, RequestDirection::Received, query).await?;
    Ok(Json(response))
}

/// Plan, persist and announce one state change.
async fn transition_request(
    app_state: &AppState,
    actor: &User,
    raw_id: &str,
    action: RequestAction,
) -> Result<BloodRequest, HttpError> {
    let request_id = Uuid::parse_str(raw_id.trim())
        .map_err(|_| HttpError::bad_request("Invalid request id"))?;

    let request = app_state
        .db_client
        .get_request(request_id)
        .await
        .map_err(|e| db_error("getting request", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::RequestNotFound.to_string()))?;

    let now = Utc::now();
    let transition = plan_transition(&request, actor.id, action, now).map_err(|e| {
        tracing::error!(%request_id, "Rejected {} transition: {}", action, e);
        HttpError::from(e)
    })?;

    let updated = match action {
        RequestAction::Complete => app_state
            .db_client
            .complete_donation(request_id, &transition, request.donor_id, now)
            .await
            .map_err(|e| db_error("completing donation", e))?,
        RequestAction::Accept | RequestAction::Reject => app_state
            .db_client
            .apply_transition(request_id, &transition)
            .await
            .map_err(|e| db_error("updating request status", e))?,
    };

    let Some(updated) = updated else {
        // someone moved the request between our read and our write
        let status = app_state
            .db_client
            .get_request(request_id)
            .await
            .map_err(|e| db_error("getting request", e))?
            .map_or(transition.from, |r| r.status);
        tracing::error!(%request_id, %status, "Concurrent {} transition lost", action);
        return Err(LifecycleError::InvalidState { action, status }.into());
    };

    let (actor_name, actor_profile) = party_profile(app_state, actor).await;
    let (recipient, data) = match action {
        RequestAction::Accept => (
            updated.requester_id,
            NotificationData::RequestAccepted {
                request_id,
                donor_name: actor_name,
                donor_phone: actor_profile.as_ref().map(|p| p.phone_num.clone()),
                donor_whatsapp: actor_profile.as_ref().map(|p| p.whatsapp_num.clone()),
            },
        ),
        RequestAction::Reject => (
            updated.requester_id,
            NotificationData::RequestRejected {
                request_id,
                donor_name: actor_name,
            },
        ),
        RequestAction::Complete => (
            updated.donor_id,
            NotificationData::DonationCompleted {
                request_id,
                requester_name: actor_name,
            },
        ),
    };
    notify(app_state, recipient, data).await;

    tracing::info!(%request_id, status = %updated.status, "Request {} successful", action);
    Ok(updated)
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn accept_request(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let request = transition_request(&app_state, &jwt.user, &id, RequestAction::Accept).await?;
    Ok(Json(RequestResponseDto {
        status: "success".to_string(),
        message: "Request accepted successfully".to_string(),
        request: BloodRequestDto::filter_request(&request),
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn reject_request(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let request = transition_request(&app_state, &jwt.user, &id, RequestAction::Reject).await?;
    Ok(Json(RequestResponseDto {
        status: "success".to_string(),
        message: "Request rejected successfully".to_string(),
        request: BloodRequestDto::filter_request(&request),
    }))
}

/// Requester confirms the donation happened; starts the donor's cooldown
#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn complete_request(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let request = transition_request(&app_state, &jwt.user, &id, RequestAction::Complete).await?;
    Ok(Json(RequestResponseDto {
        status: "success".to_string(),
        message: "Donation marked as completed successfully".to_string(),
        request: BloodRequestDto::filter_request(&request),
    }))
}

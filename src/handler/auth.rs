use crate::{
    AppState,
    db::UserExt,
    dtos::{
        AuthResponseDto, CheckAuthResponseDto, CheckUserDto, ForgotPasswordRequestDto,
        LoginUserDto, RegisterUserDto, ResetPasswordRequestDto, Response, UserSummaryDto,
        ValidateTokenResponseDto, VerifyEmailDto,
    },
    error::{ErrorMessage, HttpError},
    mail::mails::{reset_link, send_forgot_password_email, send_verification_email},
    middleware::{JWTAuthMiddleware, auth},
    models::User,
    utils::{password, secret, token},
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::Cookie;
use chrono::{Duration, Utc};
use validator::Validate;

use tracing::instrument;

/// Password reset links stay valid for one hour
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Attempts at drawing a verification code nobody else is holding
const VERIFICATION_CODE_ATTEMPTS: usize = 5;

/// Router for authentication endpoints
pub fn auth_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify", post(verify_email))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route(
            "/check",
            get(check_auth).layer(middleware::from_fn_with_state(app_state, auth)),
        )
        .route("/forgot-password", post(forgot_password))
        .route("/validate-token/{token}", get(validate_reset_token))
        .route("/reset-password/{token}", post(reset_password))
}

/// Oversized or empty passwords are the caller's fault, anything else is ours.
fn password_error(e: ErrorMessage) -> HttpError {
    match e {
        ErrorMessage::EmptyPassword | ErrorMessage::ExceededMaxPasswordLength(_) => {
            HttpError::bad_request(e.to_string())
        }
        _ => {
            tracing::error!("Password hashing error: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        }
    }
}

fn server_error(context: &str, e: impl std::fmt::Display) -> HttpError {
    tracing::error!("{}: {}", context, e);
    HttpError::server_error(ErrorMessage::ServerError.to_string())
}

/// Draw a verification code that no pending account already holds.
async fn fresh_verification_code(app_state: &AppState) -> Result<String, HttpError> {
    let mut code = secret::verification_code();
    for _ in 1..VERIFICATION_CODE_ATTEMPTS {
        let taken = app_state
            .db_client
            .get_user_by_verification_code(&code)
            .await
            .map_err(|e| server_error("DB error, checking verification code", e))?;
        if taken.is_none() {
            break;
        }
        code = secret::verification_code();
    }
    Ok(code)
}

/// Issue a JWT for `user` and answer with it both in the body and as a cookie.
fn token_response(
    app_state: &AppState,
    user: &User,
    message: &str,
) -> Result<impl IntoResponse + use<>, HttpError> {
    let access_token = token::create_token(
        &user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| server_error("Access token creation error", e))?;

    let access_cookie = Cookie::build(("access_token", access_token.clone()))
        .path("/")
        .max_age(time::Duration::seconds(app_state.env.jwt_maxage))
        .http_only(true)
        .secure(true)
        .build();

    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        HeaderValue::from_str(&access_cookie.to_string())
            .map_err(|e| server_error("Cookie header error", e))?,
    );

    let body = Json(AuthResponseDto {
        status: "success".to_string(),
        message: message.to_string(),
        token: access_token,
        user: UserSummaryDto::from_user(user),
    });

    Ok((headers, body))
}

/// Register new account
/// Hashes the password, stores a 6-digit verification code and mails it
#[instrument(skip(app_state, body), fields(email = %body.email))]
pub async fn register(
    State(app_state): State<AppState>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid register input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let email = body.email.trim().to_lowercase();

    let existing = app_state
        .db_client
        .get_user_by_email(&email)
        .await
        .map_err(|e| server_error("DB error, getting user", e))?;
    if existing.is_some() {
        tracing::error!("Email already registered");
        return Err(HttpError::bad_request("Email already registered"));
    }

    let hash_password = password::hash(&body.password).map_err(password_error)?;
    let verification_code = fresh_verification_code(&app_state).await?;

    let result = app_state
        .db_client
        .save_user(&email, &hash_password, &verification_code)
        .await;

    match result {
        Ok(user) => {
            // the account exists either way; the user can ask for the code again
            if let Err(e) =
                send_verification_email(&app_state.mailer, &user.email, &verification_code).await
            {
                tracing::error!(user_id = %user.id, "Failed to send verification email: {}", e);
            }

            tracing::info!(user_id = %user.id, "Register successful");
            Ok((
                StatusCode::CREATED,
                Json(Response {
                    status: "success",
                    message: "Registered! Check your email for verification code.".to_string(),
                }),
            ))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, saving user, unique_violation: {}", db_err);
            Err(HttpError::bad_request("Email already registered"))
        }
        Err(e) => Err(server_error("DB error, saving user", e)),
    }
}

/// Consume a verification code and log the user in
#[instrument(skip(app_state, body))]
pub async fn verify_email(
    State(app_state): State<AppState>,
    Json(body): Json<VerifyEmailDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid verify input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user = app_state
        .db_client
        .verify_user(body.code.trim())
        .await
        .map_err(|e| server_error("DB error, verifying user", e))?
        .ok_or_else(|| {
            tracing::error!("No user holds this verification code");
            HttpError::not_found("Invalid verification code")
        })?;

    let response = token_response(&app_state, &user, "Email verified and logged in!")?;
    tracing::info!(user_id = %user.id, "Email verification successful");
    Ok(response)
}

#[instrument(skip(app_state, body), fields(email = %body.email))]
pub async fn login(
    State(app_state): State<AppState>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid login input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let email = body.email.trim().to_lowercase();

    let user = app_state
        .db_client
        .get_user_by_email(&email)
        .await
        .map_err(|e| server_error("DB error, getting user", e))?
        .ok_or_else(|| {
            tracing::error!("User not found");
            HttpError::not_found("User not found")
        })?;

    if !user.verified {
        tracing::error!(user_id = %user.id, "Login before email verification");
        return Err(HttpError::forbidden("Email not verified"));
    }

    let password_matched = match password::compare(&body.password, &user.password) {
        Ok(matched) => matched,
        Err(ErrorMessage::InvalidHashFormat) => {
            return Err(server_error(
                "Stored password hash is corrupt",
                ErrorMessage::InvalidHashFormat,
            ));
        }
        Err(_) => false,
    };

    if !password_matched {
        tracing::error!(user_id = %user.id, "password mismatch");
        return Err(HttpError::unauthorized("Invalid password"));
    }

    let response = token_response(&app_state, &user, "Logged in successfully!")?;
    tracing::info!(user_id = %user.id, "Login successful");
    Ok(response)
}

/// Tokens are stateless; logging out only clears the cookie
#[instrument]
pub async fn logout() -> Result<impl IntoResponse, HttpError> {
    let cookie = Cookie::build(("access_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .http_only(true)
        .secure(true)
        .build();

    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie.to_string())
            .map_err(|e| server_error("Cookie header error", e))?,
    );

    tracing::info!("Logout successful");
    Ok((
        headers,
        Json(Response {
            status: "success",
            message: "Logged out successfully. Please remove token from client.".to_string(),
        }),
    ))
}

#[instrument(skip(jwt))]
pub async fn check_auth(
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(CheckAuthResponseDto {
        status: "success".to_string(),
        is_authenticated: true,
        user: CheckUserDto {
            id: jwt.user.id.to_string(),
            email: jwt.user.email,
            is_verified: jwt.user.verified,
        },
    }))
}

/// Mail a one-hour password reset link
#[instrument(skip(app_state, body), fields(email = %body.email))]
pub async fn forgot_password(
    State(app_state): State<AppState>,
    Json(body): Json<ForgotPasswordRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid forgot_password input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let email = body.email.trim().to_lowercase();

    let user = app_state
        .db_client
        .get_user_by_email(&email)
        .await
        .map_err(|e| server_error("DB error, getting user", e))?
        .ok_or_else(|| {
            tracing::error!("User not found");
            HttpError::not_found("User not found")
        })?;

    let reset_token = secret::reset_token();
    let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);

    app_state
        .db_client
        .set_reset_token(user.id, &reset_token, expires_at)
        .await
        .map_err(|e| server_error("DB error, saving reset token", e))?;

    let link = reset_link(&app_state.env.client_url, &reset_token);
    send_forgot_password_email(&app_state.mailer, &user.email, &link)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user.id, "Failed to send password reset email: {}", e);
            HttpError::server_error("Failed to send password reset email")
        })?;

    tracing::info!(user_id = %user.id, "Password reset link sent");
    Ok(Json(Response {
        status: "success",
        message: "Password reset link sent to your email".to_string(),
    }))
}

/// Let the frontend check a reset link before showing the form
#[instrument(skip(app_state, reset_token))]
pub async fn validate_reset_token(
    State(app_state): State<AppState>,
    Path(reset_token): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let now = Utc::now();
    let user = app_state
        .db_client
        .get_user_by_reset_token(&reset_token, now)
        .await
        .map_err(|e| server_error("DB error, getting user by reset token", e))?;

    match user {
        Some(user) => Ok((
            StatusCode::OK,
            Json(ValidateTokenResponseDto {
                valid: true,
                email: Some(user.email),
                message: None,
            }),
        )),
        None => {
            tracing::error!("Invalid or expired reset token");
            Ok((
                StatusCode::BAD_REQUEST,
                Json(ValidateTokenResponseDto {
                    valid: false,
                    email: None,
                    message: Some("Invalid or expired reset token".to_string()),
                }),
            ))
        }
    }
}

#[instrument(skip(app_state, reset_token, body))]
pub async fn reset_password(
    State(app_state): State<AppState>,
    Path(reset_token): Path<String>,
    Json(body): Json<ResetPasswordRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.check().map_err(|e| {
        tracing::error!("Invalid reset_password input: {}", e);
        HttpError::bad_request(e)
    })?;

    let now = Utc::now();
    let user = app_state
        .db_client
        .get_user_by_reset_token(&reset_token, now)
        .await
        .map_err(|e| server_error("DB error, getting user by reset token", e))?
        .ok_or_else(|| {
            tracing::error!("Invalid or expired reset token");
            HttpError::bad_request("Invalid or expired reset token")
        })?;

    let hash_password = password::hash(&body.password).map_err(password_error)?;

    let consumed = app_state
        .db_client
        .reset_password(user.id, &reset_token, &hash_password, now)
        .await
        .map_err(|e| server_error("DB error, resetting password", e))?;

    // a concurrent reset used the token first
    if !consumed {
        tracing::error!(user_id = %user.id, "Reset token already consumed");
        return Err(HttpError::bad_request("Invalid or expired reset token"));
    }

    tracing::info!(user_id = %user.id, "Password reset successful");
    Ok(Json(Response {
        status: "success",
        message: "Password reset successfully".to_string(),
    }))
}

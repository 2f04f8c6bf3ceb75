use crate::{
    db::ProfileFields,
    models::{
        BloodGroup, BloodRequest, DonorProfile, Notification, NotificationType, RequestStatus,
        RequestWithCounterpart, Urgency, User,
    },
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// DTOs (Data Transfer Objects) define the structure of data exchanged with clients
// They are separate from database models to control exactly what data is exposed.
// Request bodies default every field so a missing field fails validation (400)
// instead of deserialization.

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const DEFAULT_NOTIFICATION_LIMIT: i64 = 20;
pub const MAX_PAGE: i64 = 1_000_000;
pub const MAX_PAGE_LIMIT: i64 = 100;

// ============================================================================
// Custom validators
// ============================================================================

fn validate_blood_group(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<BloodGroup>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("blood_group").with_message("Invalid blood group".into()))
}

// Blank optional values (`?bloodGroup=`, `"urgency": ""`) mean "not given".
fn validate_blood_group_filter(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    validate_blood_group(value)
}

fn validate_urgency(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    value
        .parse::<Urgency>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("urgency").with_message("Invalid urgency level".into()))
}

fn validate_status(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    value
        .parse::<RequestStatus>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("status").with_message("Invalid request status".into()))
}

fn parse_bounded(value: &str, max: i64) -> Option<i64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|n| (1..=max).contains(n))
}

// Query numbers arrive as strings so a bad value gets the JSON error body.
fn validate_page(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || parse_bounded(value, MAX_PAGE).is_some() {
        return Ok(());
    }
    Err(ValidationError::new("page")
        .with_message(format!("page must be a number between 1 and {MAX_PAGE}").into()))
}

fn validate_limit(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || parse_bounded(value, MAX_PAGE_LIMIT).is_some() {
        return Ok(());
    }
    Err(ValidationError::new("limit")
        .with_message(format!("limit must be a number between 1 and {MAX_PAGE_LIMIT}").into()))
}

fn validate_uuid(value: &str) -> Result<(), ValidationError> {
    Uuid::parse_str(value.trim())
        .map(|_| ())
        .map_err(|_| ValidationError::new("uuid").with_message("Invalid donor id".into()))
}

fn validate_required_date(value: &str) -> Result<(), ValidationError> {
    parse_required_date(value)
        .map(|_| ())
        .ok_or_else(|| ValidationError::new("date").with_message("Invalid required date".into()))
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_required_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date_time) = DateTime::parse_from_rfc3339(value) {
        return Some(date_time.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Authentication DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterUserDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[validate(
        length(min = 1, message = "Confirm Password is required"),
        must_match(other = "password", message = "Passwords do not match")
    )]
    pub confirm_password: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyEmailDto {
    #[validate(length(min = 1, message = "Verification code is required"))]
    pub code: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequestDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequestDto {
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,

    #[validate(
        length(min = 1, message = "Password and confirm password are required"),
        must_match(other = "password", message = "Passwords do not match")
    )]
    pub confirm_password: String,
}

impl ResetPasswordRequestDto {
    /// Checked in order: both present, matching, long enough.
    pub fn check(&self) -> Result<(), String> {
        if self.password.is_empty() || self.confirm_password.is_empty() {
            return Err("Password and confirm password are required".to_string());
        }
        if self.password != self.confirm_password {
            return Err("Passwords do not match".to_string());
        }
        self.validate().map_err(|e| e.to_string())
    }
}

/// Public part of an account
#[derive(Debug, Serialize, Deserialize)]
pub struct UserSummaryDto {
    pub id: String,
    pub email: String,
}

impl UserSummaryDto {
    pub fn from_user(user: &User) -> Self {
        UserSummaryDto {
            id: user.id.to_string(),
            email: user.email.to_owned(),
        }
    }
}

/// Verify and login success body
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponseDto {
    pub status: String,
    pub message: String,
    pub token: String,
    pub user: UserSummaryDto,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUserDto {
    pub id: String,
    pub email: String,
    pub is_verified: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAuthResponseDto {
    pub status: String,
    pub is_authenticated: bool,
    pub user: CheckUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateTokenResponseDto {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Generic success response
#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub current_page: i64,
    pub total_pages: i64,
    pub total: i64,
    pub limit: i64,
}

impl PaginationDto {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        PaginationDto {
            current_page: page,
            total_pages,
            total,
            limit,
        }
    }
}

/// Resolve optional page/limit query values; blank or unparsable values fall back to defaults
pub fn page_and_limit(page: Option<&str>, limit: Option<&str>, default_limit: i64) -> (i64, i64) {
    (
        page.and_then(|p| parse_bounded(p, MAX_PAGE)).unwrap_or(1),
        limit
            .and_then(|l| parse_bounded(l, MAX_PAGE_LIMIT))
            .unwrap_or(default_limit),
    )
}

// ============================================================================
// Donor profile DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileInputDto {
    #[validate(length(min = 1, message = "All fields are required"))]
    pub name: String,

    #[validate(length(min = 1, message = "All fields are required"))]
    pub phone_num: String,

    #[validate(length(min = 1, message = "All fields are required"))]
    pub whatsapp_num: String,

    #[validate(
        required(message = "All fields are required"),
        range(min = 18, max = 65, message = "Age must be between 18 and 65")
    )]
    pub age: Option<i32>,

    #[validate(length(min = 1, message = "All fields are required"))]
    pub city: String,

    #[validate(
        length(min = 1, message = "All fields are required"),
        custom(function = "validate_blood_group")
    )]
    pub blood_group: String,
}

impl ProfileInputDto {
    pub fn trimmed(self) -> Self {
        ProfileInputDto {
            name: self.name.trim().to_string(),
            phone_num: self.phone_num.trim().to_string(),
            whatsapp_num: self.whatsapp_num.trim().to_string(),
            age: self.age,
            city: self.city.trim().to_string(),
            blood_group: self.blood_group.trim().to_string(),
        }
    }

    /// Convert a validated body into the stored fields
    pub fn into_fields(self) -> Result<ProfileFields, String> {
        let age = self.age.ok_or_else(|| "All fields are required".to_string())?;
        let blood_group = self
            .blood_group
            .parse::<BloodGroup>()
            .map_err(|_| "Invalid blood group".to_string())?;

        Ok(ProfileFields {
            name: self.name,
            phone_num: self.phone_num,
            whatsapp_num: self.whatsapp_num,
            age,
            city: self.city,
            blood_group,
        })
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AvailabilityDto {
    #[validate(required(message = "isAvailable is required"))]
    pub is_available: Option<bool>,
}

#[derive(Validate, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorQueryDto {
    #[validate(custom(function = "validate_blood_group_filter"))]
    pub blood_group: Option<String>,

    pub city: Option<String>,

    #[validate(custom(function = "validate_page"))]
    pub page: Option<String>,

    #[validate(custom(function = "validate_limit"))]
    pub limit: Option<String>,
}

/// Full profile for its owner. `is_available` is the effective availability.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterProfileDto {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub phone_num: String,
    pub whatsapp_num: String,
    pub age: i32,
    pub city: String,
    pub blood_group: BloodGroup,
    pub is_available: bool,
    pub total_donations: i32,
    pub rating: f64,
    pub total_ratings: i32,
    pub last_donation_date: Option<DateTime<Utc>>,
    pub available_after: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl FilterProfileDto {
    pub fn filter_profile(profile: &DonorProfile, now: DateTime<Utc>, email: Option<&str>) -> Self {
        FilterProfileDto {
            id: profile.id.to_string(),
            user_id: profile.user_id.to_string(),
            name: profile.name.to_owned(),
            phone_num: profile.phone_num.to_owned(),
            whatsapp_num: profile.whatsapp_num.to_owned(),
            age: profile.age,
            city: profile.city.to_owned(),
            blood_group: profile.blood_group,
            is_available: profile.is_effectively_available(now),
            total_donations: profile.total_donations,
            rating: profile.rating,
            total_ratings: profile.total_ratings,
            last_donation_date: profile.last_donation_date,
            available_after: profile.available_after,
            email: email.map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponseDto {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub profile: FilterProfileDto,
}

/// Donor search row; contact details stay private until a request is accepted
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorListItemDto {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub city: String,
    pub blood_group: BloodGroup,
    pub total_donations: i32,
    pub rating: f64,
    pub is_available: bool,
}

impl DonorListItemDto {
    pub fn filter_donors(donors: &[DonorProfile], now: DateTime<Utc>) -> Vec<DonorListItemDto> {
        donors
            .iter()
            .map(|donor| DonorListItemDto {
                id: donor.id.to_string(),
                user_id: donor.user_id.to_string(),
                name: donor.name.to_owned(),
                city: donor.city.to_owned(),
                blood_group: donor.blood_group,
                total_donations: donor.total_donations,
                rating: donor.rating,
                is_available: donor.is_effectively_available(now),
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DonorListResponseDto {
    pub status: String,
    pub donors: Vec<DonorListItemDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponseDto {
    pub status: String,
    pub message: String,
    pub is_available: bool,
}

// ============================================================================
// Blood request DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendRequestDto {
    #[validate(
        length(min = 1, message = "Donor, blood group, and required date are required"),
        custom(function = "validate_uuid")
    )]
    pub donor_id: String,

    #[validate(
        length(min = 1, message = "Donor, blood group, and required date are required"),
        custom(function = "validate_blood_group")
    )]
    pub blood_group: String,

    #[validate(custom(function = "validate_urgency"))]
    pub urgency: Option<String>,

    #[validate(length(max = 500, message = "Message must not exceed 500 characters"))]
    pub message: Option<String>,

    pub hospital_name: Option<String>,

    pub hospital_address: Option<String>,

    #[validate(
        length(min = 1, message = "Donor, blood group, and required date are required"),
        custom(function = "validate_required_date")
    )]
    pub required_date: String,
}

/// A validated send-request body
#[derive(Debug, Clone, PartialEq)]
pub struct SendRequestInput {
    pub donor_id: Uuid,
    pub blood_group: BloodGroup,
    pub urgency: Urgency,
    pub message: Option<String>,
    pub hospital_name: Option<String>,
    pub hospital_address: Option<String>,
    pub required_date: DateTime<Utc>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SendRequestDto {
    pub fn parse(self) -> Result<SendRequestInput, String> {
        let donor_id = Uuid::parse_str(self.donor_id.trim()).map_err(|_| "Invalid donor id")?;
        let blood_group = self
            .blood_group
            .parse::<BloodGroup>()
            .map_err(|_| "Invalid blood group")?;
        let urgency = match non_blank(self.urgency) {
            Some(urgency) => urgency.parse::<Urgency>().map_err(|_| "Invalid urgency level")?,
            None => Urgency::default(),
        };
        let required_date =
            parse_required_date(&self.required_date).ok_or("Invalid required date")?;

        Ok(SendRequestInput {
            donor_id,
            blood_group,
            urgency,
            message: non_blank(self.message),
            hospital_name: non_blank(self.hospital_name),
            hospital_address: non_blank(self.hospital_address),
            required_date,
        })
    }
}

#[derive(Validate, Debug, Default, Deserialize)]
pub struct RequestListQueryDto {
    #[validate(custom(function = "validate_status"))]
    pub status: Option<String>,

    #[validate(custom(function = "validate_page"))]
    pub page: Option<String>,

    #[validate(custom(function = "validate_limit"))]
    pub limit: Option<String>,
}

impl RequestListQueryDto {
    pub fn status_filter(&self) -> Option<RequestStatus> {
        self.status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequestDto {
    pub id: String,
    pub requester_id: String,
    pub donor_id: String,
    pub blood_group: BloodGroup,
    pub status: RequestStatus,
    pub urgency: Urgency,
    pub message: Option<String>,
    pub hospital_name: Option<String>,
    pub hospital_address: Option<String>,
    pub required_date: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub donation_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BloodRequestDto {
    pub fn filter_request(request: &BloodRequest) -> Self {
        BloodRequestDto {
            id: request.id.to_string(),
            requester_id: request.requester_id.to_string(),
            donor_id: request.donor_id.to_string(),
            blood_group: request.blood_group,
            status: request.status,
            urgency: request.urgency,
            message: request.message.clone(),
            hospital_name: request.hospital_name.clone(),
            hospital_address: request.hospital_address.clone(),
            required_date: request.required_date,
            accepted_at: request.accepted_at,
            completed_at: request.completed_at,
            donation_completed: request.donation_completed,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// Display fields of the other party
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartDto {
    pub name: String,
    pub city: Option<String>,
    pub blood_group: Option<BloodGroup>,
    pub phone_num: Option<String>,
    pub whatsapp_num: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestListItemDto {
    #[serde(flatten)]
    pub request: BloodRequestDto,
    pub counterpart: CounterpartDto,
}

impl RequestListItemDto {
    pub fn filter_requests(rows: &[RequestWithCounterpart]) -> Vec<RequestListItemDto> {
        rows.iter()
            .map(|row| RequestListItemDto {
                request: BloodRequestDto::filter_request(&row.request),
                counterpart: CounterpartDto {
                    name: row
                        .counterpart_name
                        .clone()
                        .unwrap_or_else(|| "Unknown".to_string()),
                    city: row.counterpart_city.clone(),
                    blood_group: row.counterpart_blood_group,
                    phone_num: row.counterpart_phone_num.clone(),
                    whatsapp_num: row.counterpart_whatsapp_num.clone(),
                },
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestListResponseDto {
    pub status: String,
    pub requests: Vec<RequestListItemDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestResponseDto {
    pub status: String,
    pub message: String,
    pub request: BloodRequestDto,
}

// ============================================================================
// Notification DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQueryDto {
    #[validate(custom(function = "validate_page"))]
    pub page: Option<String>,

    #[validate(custom(function = "validate_limit"))]
    pub limit: Option<String>,

    pub unread_only: Option<String>,
}

impl NotificationQueryDto {
    /// Only the literal `true` turns the filter on.
    pub fn unread_only(&self) -> bool {
        self.unread_only.as_deref().map(str::trim) == Some("true")
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationDto {
    pub fn filter_notifications(notifications: &[Notification]) -> Vec<NotificationDto> {
        notifications
            .iter()
            .map(|n| NotificationDto {
                id: n.id.to_string(),
                notification_type: n.notification_type,
                title: n.title.to_owned(),
                message: n.message.to_owned(),
                data: n.data.0.payload(),
                is_read: n.is_read,
                created_at: n.created_at,
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponseDto {
    pub status: String,
    pub notifications: Vec<NotificationDto>,
    pub pagination: PaginationDto,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponseDto {
    pub status: String,
    pub unread_count: i64,
}

// ============================================================================
// Service
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponseDto {
    pub message: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

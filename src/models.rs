use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// Returned when a string is not one of an enum's wire values.
#[derive(Debug, Error, PartialEq)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// ABO/Rh blood group, stored as the PostgreSQL ENUM "blood_group".
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "blood_group")]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    #[sqlx(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    #[sqlx(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    #[sqlx(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    #[sqlx(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    #[sqlx(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    #[sqlx(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    #[sqlx(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    #[sqlx(rename = "O-")]
    ONegative,
}

impl BloodGroup {
    pub const ALL: [BloodGroup; 8] = [
        BloodGroup::APositive,
        BloodGroup::ANegative,
        BloodGroup::BPositive,
        BloodGroup::BNegative,
        BloodGroup::AbPositive,
        BloodGroup::AbNegative,
        BloodGroup::OPositive,
        BloodGroup::ONegative,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            BloodGroup::APositive => "A+",
            BloodGroup::ANegative => "A-",
            BloodGroup::BPositive => "B+",
            BloodGroup::BNegative => "B-",
            BloodGroup::AbPositive => "AB+",
            BloodGroup::AbNegative => "AB-",
            BloodGroup::OPositive => "O+",
            BloodGroup::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for BloodGroup {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // An unescaped '+' in a query string arrives here as a space ("A " for "A+").
        let value = s.trim();
        let decoded_plus = !value.ends_with(['+', '-'])
            && s.trim_start()
                .strip_prefix(value)
                .is_some_and(|rest| rest.starts_with(' '));
        let normalized = if decoded_plus {
            format!("{value}+")
        } else {
            value.to_string()
        }
        .to_uppercase();
        BloodGroup::ALL
            .into_iter()
            .find(|group| group.to_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                kind: "blood group",
                value: s.to_string(),
            })
    }
}

/// Lifecycle state of a blood request.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn to_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "rejected" => Ok(RequestStatus::Rejected),
            "completed" => Ok(RequestStatus::Completed),
            "cancelled" => Ok(RequestStatus::Cancelled),
            _ => Err(ParseEnumError {
                kind: "status",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "urgency_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl FromStr for Urgency {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            "critical" => Ok(Urgency::Critical),
            _ => Err(ParseEnumError {
                kind: "urgency",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BloodRequest,
    RequestAccepted,
    RequestRejected,
    DonationCompleted,
    Reminder,
}

/// Account record (table "users").
///
/// `verification_code` is set at registration and cleared once the email is
/// verified; `reset_password_token`/`reset_password_expires` live for one hour
/// after a forgot-password request.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub verified: bool,
    pub verification_code: Option<String>,
    pub reset_password_token: Option<String>,
    pub reset_password_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Donor profile, one per user (table "donor_profiles").
///
/// `rating` and `total_ratings` are stored and returned but nothing writes them.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct DonorProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone_num: String,
    pub whatsapp_num: String,
    pub age: i32,
    pub city: String,
    pub blood_group: BloodGroup,
    pub is_available: bool,
    pub last_donation_date: Option<DateTime<Utc>>,
    pub available_after: Option<DateTime<Utc>>,
    pub total_donations: i32,
    pub rating: f64,
    pub total_ratings: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Requester -> donor transaction (table "blood_requests").
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct BloodRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub donor_id: Uuid,
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
    pub rating: Option<i16>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A request row joined with the display fields of the other party's profile.
/// The profile columns are NULL when that user never created a profile.
#[derive(Debug, sqlx::FromRow, Clone)]
pub struct RequestWithCounterpart {
    #[sqlx(flatten)]
    pub request: BloodRequest,
    pub counterpart_name: Option<String>,
    pub counterpart_city: Option<String>,
    pub counterpart_blood_group: Option<BloodGroup>,
    pub counterpart_phone_num: Option<String>,
    pub counterpart_whatsapp_num: Option<String>,
}

/// Typed notification payload, stored as JSONB.
///
/// Serialized adjacently tagged: `{"type": "request_accepted", "data": {...}}`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationData {
    #[serde(rename_all = "camelCase")]
    BloodRequest {
        request_id: Uuid,
        requester_name: String,
        blood_group: BloodGroup,
        urgency: Urgency,
    },
    #[serde(rename_all = "camelCase")]
    RequestAccepted {
        request_id: Uuid,
        donor_name: String,
        donor_phone: Option<String>,
        #[serde(rename = "donorWhatsApp")]
        donor_whatsapp: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    RequestRejected { request_id: Uuid, donor_name: String },
    #[serde(rename_all = "camelCase")]
    DonationCompleted {
        request_id: Uuid,
        requester_name: String,
    },
    #[serde(rename_all = "camelCase")]
    Reminder {
        request_id: Option<Uuid>,
        note: String,
    },
}

/// In-app notification (table "notifications"). Soft-deleted rows keep
/// `is_deleted = true` and are filtered out of every read.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: Json<NotificationData>,
    pub is_read: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_blood_groups() {
        assert_eq!("AB-".parse::<BloodGroup>(), Ok(BloodGroup::AbNegative));
        assert_eq!("o+".parse::<BloodGroup>(), Ok(BloodGroup::OPositive));
        // '+' decoded to a space by the query string parser
        assert_eq!("A ".parse::<BloodGroup>(), Ok(BloodGroup::APositive));
        assert_eq!("ab ".parse::<BloodGroup>(), Ok(BloodGroup::AbPositive));
        // trailing whitespace after an explicit sign is only padding
        assert_eq!("AB+ ".parse::<BloodGroup>(), Ok(BloodGroup::AbPositive));
        assert_eq!(" O-  ".parse::<BloodGroup>(), Ok(BloodGroup::ONegative));
        assert!("A".parse::<BloodGroup>().is_err());
        assert!("C+".parse::<BloodGroup>().is_err());
        assert!("".parse::<BloodGroup>().is_err());
    }

    #[test]
    fn blood_group_wire_format() {
        assert_eq!(serde_json::to_string(&BloodGroup::AbPositive).unwrap(), "\"AB+\"");
        for group in BloodGroup::ALL {
            assert_eq!(group.to_string().parse::<BloodGroup>(), Ok(group));
        }
    }

    #[test]
    fn parses_urgency() {
        assert_eq!("Critical".parse::<Urgency>(), Ok(Urgency::Critical));
        assert_eq!(Urgency::default(), Urgency::Medium);
        assert!("urgent".parse::<Urgency>().is_err());
    }

    #[test]
    fn parses_request_status() {
        assert_eq!("Accepted".parse::<RequestStatus>(), Ok(RequestStatus::Accepted));
        assert_eq!(RequestStatus::Completed.to_string(), "completed");
        assert!("done".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn notification_payload_is_tagged_by_type() {
        let request_id = Uuid::new_v4();
        let payload = NotificationData::RequestRejected {
            request_id,
            donor_name: "Sara".to_string(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "request_rejected");
        assert_eq!(json["data"]["donorName"], "Sara");
        assert_eq!(json["data"]["requestId"], request_id.to_string());

        let back: NotificationData = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }
}

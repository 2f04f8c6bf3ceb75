use uuid::Uuid;

use crate::models::{NotificationData, NotificationType};

impl NotificationData {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            NotificationData::BloodRequest { .. } => NotificationType::BloodRequest,
            NotificationData::RequestAccepted { .. } => NotificationType::RequestAccepted,
            NotificationData::RequestRejected { .. } => NotificationType::RequestRejected,
            NotificationData::DonationCompleted { .. } => NotificationType::DonationCompleted,
            NotificationData::Reminder { .. } => NotificationType::Reminder,
        }
    }

    pub fn request_id(&self) -> Option<Uuid> {
        match self {
            NotificationData::BloodRequest { request_id, .. }
            | NotificationData::RequestAccepted { request_id, .. }
            | NotificationData::RequestRejected { request_id, .. }
            | NotificationData::DonationCompleted { request_id, .. } => Some(*request_id),
            NotificationData::Reminder { request_id, .. } => *request_id,
        }
    }

    /// The variant's fields as a flat JSON object, without the type tag.
    pub fn payload(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut tagged)) => {
                tagged.remove("data").unwrap_or_default()
            }
            _ => serde_json::Value::Null,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NotificationData::BloodRequest { .. } => "New Blood Request",
            NotificationData::RequestAccepted { .. } => "Blood Request Accepted",
            NotificationData::RequestRejected { .. } => "Blood Request Rejected",
            NotificationData::DonationCompleted { .. } => "Donation Completed",
            NotificationData::Reminder { .. } => "Reminder",
        }
    }

    pub fn message(&self) -> String {
        match self {
            NotificationData::BloodRequest {
                requester_name,
                blood_group,
                ..
            } => format!("{requester_name} has requested {blood_group} blood donation"),
            NotificationData::RequestAccepted { donor_name, .. } => {
                format!("{donor_name} has accepted your blood request")
            }
            NotificationData::RequestRejected { donor_name, .. } => {
                format!("{donor_name} has rejected your blood request")
            }
            NotificationData::DonationCompleted { requester_name, .. } => format!(
                "{requester_name} has marked the donation as completed. \
                 You will be available for donation again in 5 months."
            ),
            NotificationData::Reminder { note, .. } => note.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BloodGroup, Urgency};

    #[test]
    fn renders_blood_request() {
        let request_id = Uuid::new_v4();
        let data = NotificationData::BloodRequest {
            request_id,
            requester_name: "Omar".to_string(),
            blood_group: BloodGroup::BNegative,
            urgency: Urgency::Critical,
        };

        assert_eq!(data.notification_type(), NotificationType::BloodRequest);
        assert_eq!(data.title(), "New Blood Request");
        assert_eq!(data.message(), "Omar has requested B- blood donation");
        assert_eq!(data.request_id(), Some(request_id));
    }

    #[test]
    fn renders_lifecycle_replies() {
        let request_id = Uuid::new_v4();

        let accepted = NotificationData::RequestAccepted {
            request_id,
            donor_name: "Lina".to_string(),
            donor_phone: Some("+100".to_string()),
            donor_whatsapp: None,
        };
        assert_eq!(accepted.notification_type(), NotificationType::RequestAccepted);
        assert_eq!(accepted.message(), "Lina has accepted your blood request");

        let payload = accepted.payload();
        assert_eq!(payload["donorName"], "Lina");
        assert_eq!(payload["donorPhone"], "+100");
        assert!(payload["donorWhatsApp"].is_null());
        assert_eq!(payload["requestId"], request_id.to_string());
        assert!(payload.get("type").is_none());

        let completed = NotificationData::DonationCompleted {
            request_id,
            requester_name: "Omar".to_string(),
        };
        assert_eq!(completed.title(), "Donation Completed");
        assert!(completed.message().starts_with("Omar has marked the donation as completed."));
        assert!(completed.message().ends_with("again in 5 months."));
    }

    #[test]
    fn reminder_without_request() {
        let reminder = NotificationData::Reminder {
            request_id: None,
            note: "You can donate again".to_string(),
        };
        assert_eq!(reminder.notification_type(), NotificationType::Reminder);
        assert_eq!(reminder.request_id(), None);
        assert_eq!(reminder.message(), "You can donate again");
    }
}

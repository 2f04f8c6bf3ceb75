use chrono::{DateTime, Duration, Utc};

use crate::models::DonorProfile;

/// Days a donor stays unavailable after a completed donation (five 30-day months).
pub const COOLDOWN_DAYS: i64 = 5 * 30;

/// The profile fields that decide availability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvailabilitySnapshot {
    pub is_available: bool,
    pub available_after: Option<DateTime<Utc>>,
    pub last_donation_date: Option<DateTime<Utc>>,
    pub total_donations: i32,
}

impl From<&DonorProfile> for AvailabilitySnapshot {
    fn from(profile: &DonorProfile) -> Self {
        AvailabilitySnapshot {
            is_available: profile.is_available,
            available_after: profile.available_after,
            last_donation_date: profile.last_donation_date,
            total_donations: profile.total_donations,
        }
    }
}

impl DonorProfile {
    pub fn availability(&self) -> AvailabilitySnapshot {
        AvailabilitySnapshot::from(self)
    }

    pub fn is_effectively_available(&self, now: DateTime<Utc>) -> bool {
        is_effectively_available(&self.availability(), now)
    }
}

/// A donor can be asked only if the raw flag is on and any cooldown has lapsed.
pub fn is_effectively_available(snapshot: &AvailabilitySnapshot, now: DateTime<Utc>) -> bool {
    if !snapshot.is_available {
        return false;
    }
    match snapshot.available_after {
        Some(available_after) => now >= available_after,
        None => true,
    }
}

/// Mutation to persist after a completed donation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DonationUpdate {
    pub is_available: bool,
    pub last_donation_date: DateTime<Utc>,
    pub available_after: DateTime<Utc>,
    pub total_donations: i32,
}

/// Record a donation at `now`: flag off, cooldown started, counter bumped.
pub fn record_donation(snapshot: &AvailabilitySnapshot, now: DateTime<Utc>) -> DonationUpdate {
    DonationUpdate {
        is_available: false,
        last_donation_date: now,
        available_after: now + Duration::days(COOLDOWN_DAYS),
        total_donations: snapshot.total_donations + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(update: &DonationUpdate) -> AvailabilitySnapshot {
        AvailabilitySnapshot {
            is_available: update.is_available,
            available_after: Some(update.available_after),
            last_donation_date: Some(update.last_donation_date),
            total_donations: update.total_donations,
        }
    }

    fn snapshot(is_available: bool, available_after: Option<DateTime<Utc>>) -> AvailabilitySnapshot {
        AvailabilitySnapshot {
            is_available,
            available_after,
            last_donation_date: None,
            total_donations: 0,
        }
    }

    #[test]
    fn available_without_cooldown() {
        let now = Utc::now();
        assert!(is_effectively_available(&snapshot(true, None), now));
        assert!(!is_effectively_available(&snapshot(false, None), now));
    }

    #[test]
    fn cooldown_in_the_future_blocks_even_when_flag_is_on() {
        let now = Utc::now();
        let profile = snapshot(true, Some(now + Duration::days(10)));
        assert!(!is_effectively_available(&profile, now));
        assert!(!is_effectively_available(&profile, now + Duration::days(9)));
        assert!(is_effectively_available(&profile, now + Duration::days(10)));
    }

    #[test]
    fn lapsed_cooldown_still_needs_the_flag() {
        let now = Utc::now();
        let lapsed = Some(now - Duration::days(1));
        assert!(is_effectively_available(&snapshot(true, lapsed), now));
        assert!(!is_effectively_available(&snapshot(false, lapsed), now));
    }

    #[test]
    fn donation_starts_cooldown() {
        let now = Utc::now();
        let before = AvailabilitySnapshot {
            is_available: true,
            available_after: None,
            last_donation_date: None,
            total_donations: 3,
        };

        let update = record_donation(&before, now);
        assert!(!update.is_available);
        assert_eq!(update.last_donation_date, now);
        assert_eq!(update.available_after, now + Duration::days(150));
        assert_eq!(update.total_donations, 4);

        let after = applied(&update);
        assert!(!is_effectively_available(&after, now));
        assert!(!is_effectively_available(&after, now + Duration::days(149)));
        // flag stays off after the cooldown until the donor flips it back
        assert!(!is_effectively_available(&after, now + Duration::days(151)));

        let toggled = AvailabilitySnapshot {
            is_available: true,
            ..after
        };
        assert!(!is_effectively_available(&toggled, now + Duration::days(30)));
        assert!(is_effectively_available(&toggled, now + Duration::days(150)));
    }
}

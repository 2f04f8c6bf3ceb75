use super::{DBClient, offset};
use crate::{
    domain::{availability::record_donation, request_flow::Transition},
    models::{BloodGroup, BloodRequest, DonorProfile, RequestStatus, RequestWithCounterpart, Urgency},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewBloodRequest {
    pub requester_id: Uuid,
    pub donor_id: Uuid,
    pub blood_group: BloodGroup,
    pub urgency: Urgency,
    pub message: Option<String>,
    pub hospital_name: Option<String>,
    pub hospital_address: Option<String>,
    pub required_date: DateTime<Utc>,
}

/// Which side of the request the caller is listing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDirection {
    /// Requests the caller sent; the counterpart is the donor
    Sent,
    /// Requests addressed to the caller; the counterpart is the requester
    Received,
}

impl RequestDirection {
    fn own_column(&self) -> &'static str {
        match self {
            RequestDirection::Sent => "requester_id",
            RequestDirection::Received => "donor_id",
        }
    }

    fn counterpart_column(&self) -> &'static str {
        match self {
            RequestDirection::Sent => "donor_id",
            RequestDirection::Received => "requester_id",
        }
    }
}

const TRANSITION_UPDATE: &str = r#"
    UPDATE blood_requests
    SET status = $1,
        accepted_at = COALESCE($2, accepted_at),
        completed_at = COALESCE($3, completed_at),
        donation_completed = donation_completed OR $4,
        updated_at = NOW()
    WHERE id = $5 AND status = $6
    RETURNING *
"#;

/// Blood request database operations trait
pub trait RequestExt {
    /// Insert a pending request. A second pending request for the same pair
    /// fails with a unique violation.
    async fn create_request(&self, request: &NewBloodRequest) -> Result<BloodRequest, sqlx::Error>;

    async fn get_request(&self, request_id: Uuid) -> Result<Option<BloodRequest>, sqlx::Error>;

    async fn has_pending_request(
        &self,
        requester_id: Uuid,
        donor_id: Uuid,
    ) -> Result<bool, sqlx::Error>;

    /// Write a planned transition. Returns `None` when the request is no longer
    /// in `transition.from` (someone else moved it first).
    async fn apply_transition(
        &self,
        request_id: Uuid,
        transition: &Transition,
    ) -> Result<Option<BloodRequest>, sqlx::Error>;

    /// Complete a donation and start the donor's cooldown in one transaction.
    async fn complete_donation(
        &self,
        request_id: Uuid,
        transition: &Transition,
        donor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<BloodRequest>, sqlx::Error>;

    /// Newest first, joined with the counterpart's profile
    async fn list_requests(
        &self,
        user_id: Uuid,
        direction: RequestDirection,
        status: Option<RequestStatus>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<RequestWithCounterpart>, sqlx::Error>;

    async fn count_requests(
        &self,
        user_id: Uuid,
        direction: RequestDirection,
        status: Option<RequestStatus>,
    ) -> Result<i64, sqlx::Error>;
}

impl RequestExt for DBClient {
    async fn create_request(&self, request: &NewBloodRequest) -> Result<BloodRequest, sqlx::Error> {
        sqlx::query_as::<_, BloodRequest>(
            r#"
            INSERT INTO blood_requests
                (requester_id, donor_id, blood_group, urgency, message,
                 hospital_name, hospital_address, required_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(request.requester_id)
        .bind(request.donor_id)
        .bind(request.blood_group)
        .bind(request.urgency)
        .bind(request.message.as_deref())
        .bind(request.hospital_name.as_deref())
        .bind(request.hospital_address.as_deref())
        .bind(request.required_date)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_request(&self, request_id: Uuid) -> Result<Option<BloodRequest>, sqlx::Error> {
        sqlx::query_as::<_, BloodRequest>("SELECT * FROM blood_requests WHERE id = $1")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn has_pending_request(
        &self,
        requester_id: Uuid,
        donor_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM blood_requests
                WHERE requester_id = $1 AND donor_id = $2 AND status = 'pending'
            )
            "#,
        )
        .bind(requester_id)
        .bind(donor_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn apply_transition(
        &self,
        request_id: Uuid,
        transition: &Transition,
    ) -> Result<Option<BloodRequest>, sqlx::Error> {
        sqlx::query_as::<_, BloodRequest>(TRANSITION_UPDATE)
            .bind(transition.to)
            .bind(transition.accepted_at)
            .bind(transition.completed_at)
            .bind(transition.donation_completed)
            .bind(request_id)
            .bind(transition.from)
            .fetch_optional(&self.pool)
            .await
    }

    async fn complete_donation(
        &self,
        request_id: Uuid,
        transition: &Transition,
        donor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<BloodRequest>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, BloodRequest>(TRANSITION_UPDATE)
            .bind(transition.to)
            .bind(transition.accepted_at)
            .bind(transition.completed_at)
            .bind(transition.donation_completed)
            .bind(request_id)
            .bind(transition.from)
            .fetch_optional(&mut *tx)
            .await?;

        // dropping the transaction rolls it back
        let Some(updated) = updated else {
            return Ok(None);
        };

        // row lock so two completions for the same donor cannot lose a count
        let donor = sqlx::query_as::<_, DonorProfile>(
            "SELECT * FROM donor_profiles WHERE user_id = $1 FOR UPDATE",
        )
        .bind(donor_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(donor) = donor {
            let donation = record_donation(&donor.availability(), now);
            sqlx::query(
                r#"
                UPDATE donor_profiles
                SET is_available = $1,
                    last_donation_date = $2,
                    available_after = $3,
                    total_donations = $4,
                    updated_at = NOW()
                WHERE user_id = $5
                "#,
            )
            .bind(donation.is_available)
            .bind(donation.last_donation_date)
            .bind(donation.available_after)
            .bind(donation.total_donations)
            .bind(donor_id)
            .execute(&mut *tx)
            .await?;
        } else {
            tracing::warn!(%donor_id, %request_id, "Completed request has no donor profile to update");
        }

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn list_requests(
        &self,
        user_id: Uuid,
        direction: RequestDirection,
        status: Option<RequestStatus>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<RequestWithCounterpart>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT r.*,
                   p.name AS counterpart_name,
                   p.city AS counterpart_city,
                   p.blood_group AS counterpart_blood_group,
                   p.phone_num AS counterpart_phone_num,
                   p.whatsapp_num AS counterpart_whatsapp_num
            FROM blood_requests r
            LEFT JOIN donor_profiles p ON p.user_id = r.{counterpart}
            WHERE r.{own} = $1 AND ($2::request_status IS NULL OR r.status = $2)
            ORDER BY r.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            counterpart = direction.counterpart_column(),
            own = direction.own_column(),
        );

        sqlx::query_as::<_, RequestWithCounterpart>(&query)
            .bind(user_id)
            .bind(status)
            .bind(limit)
            .bind(offset(page, limit))
            .fetch_all(&self.pool)
            .await
    }

    async fn count_requests(
        &self,
        user_id: Uuid,
        direction: RequestDirection,
        status: Option<RequestStatus>,
    ) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*) FROM blood_requests \
             WHERE {own} = $1 AND ($2::request_status IS NULL OR status = $2)",
            own = direction.own_column(),
        );

        sqlx::query_scalar::<_, i64>(&query)
            .bind(user_id)
            .bind(status)
            .fetch_one(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::ProfileExt,
        domain::{
            availability::COOLDOWN_DAYS,
            request_flow::{RequestAction, plan_transition},
        },
    };
    use chrono::Duration;
    use sqlx::{Pool, Postgres};

    const SARA: Uuid = Uuid::from_u128(0x11111111_1111_1111_1111_111111111111);
    const LINA: Uuid = Uuid::from_u128(0x22222222_2222_2222_2222_222222222222);

    fn sara_asks_lina() -> NewBloodRequest {
        NewBloodRequest {
            requester_id: SARA,
            donor_id: LINA,
            blood_group: BloodGroup::OPositive,
            urgency: Urgency::High,
            message: Some("Surgery on Friday".to_string()),
            hospital_name: Some("General".to_string()),
            hospital_address: None,
            required_date: Utc::now() + Duration::days(3),
        }
    }

    #[test]
    fn direction_picks_the_counterpart() {
        assert_eq!(RequestDirection::Sent.own_column(), "requester_id");
        assert_eq!(RequestDirection::Sent.counterpart_column(), "donor_id");
        assert_eq!(RequestDirection::Received.own_column(), "donor_id");
        assert_eq!(RequestDirection::Received.counterpart_column(), "requester_id");
    }

    #[sqlx::test(migrations = "./migrations", fixtures("../../fixtures/donors.sql"))]
    async fn second_pending_request_is_a_unique_violation(pool: Pool<Postgres>) {
        let db = DBClient::new(pool);

        let first = db.create_request(&sara_asks_lina()).await.unwrap();
        assert_eq!(first.status, RequestStatus::Pending);
        assert!(db.has_pending_request(SARA, LINA).await.unwrap());
        assert!(!db.has_pending_request(LINA, SARA).await.unwrap());

        match db.create_request(&sara_asks_lina()).await {
            Err(sqlx::Error::Database(err)) => assert!(err.is_unique_violation()),
            other => panic!("expected a unique violation, got {other:?}"),
        }

        // once answered, the pair may open a new request
        let now = Utc::now();
        let reject = plan_transition(&first, LINA, RequestAction::Reject, now).unwrap();
        db.apply_transition(first.id, &reject).await.unwrap().unwrap();
        assert!(db.create_request(&sara_asks_lina()).await.is_ok());
    }

    #[sqlx::test(migrations = "./migrations", fixtures("../../fixtures/donors.sql"))]
    async fn stale_transition_is_not_applied(pool: Pool<Postgres>) {
        let db = DBClient::new(pool);
        let request = db.create_request(&sara_asks_lina()).await.unwrap();
        let now = Utc::now();

        let accept = plan_transition(&request, LINA, RequestAction::Accept, now).unwrap();
        let reject = plan_transition(&request, LINA, RequestAction::Reject, now).unwrap();

        let accepted = db.apply_transition(request.id, &accept).await.unwrap().unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);
        assert!(accepted.accepted_at.is_some());

        // planned against the pending row, which no longer exists
        assert!(db.apply_transition(request.id, &reject).await.unwrap().is_none());
        let stored = db.get_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Accepted);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("../../fixtures/donors.sql"))]
    async fn completion_starts_the_donor_cooldown(pool: Pool<Postgres>) {
        let db = DBClient::new(pool);
        let request = db.create_request(&sara_asks_lina()).await.unwrap();
        let now = Utc::now();

        let accept = plan_transition(&request, LINA, RequestAction::Accept, now).unwrap();
        let accepted = db.apply_transition(request.id, &accept).await.unwrap().unwrap();

        let complete = plan_transition(&accepted, SARA, RequestAction::Complete, now).unwrap();
        let completed = db
            .complete_donation(request.id, &complete, LINA, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(completed.status, RequestStatus::Completed);
        assert!(completed.donation_completed);
        assert!(completed.accepted_at.is_some());

        let lina = db.get_profile(LINA).await.unwrap().unwrap();
        assert_eq!(lina.total_donations, 3);
        assert!(!lina.is_available);
        assert!(lina.last_donation_date.is_some());
        let cooldown_end = lina.available_after.unwrap();
        let expected = now + Duration::days(COOLDOWN_DAYS);
        assert!((cooldown_end - expected).num_seconds().abs() < 1);
        assert!(!lina.is_effectively_available(now + Duration::days(COOLDOWN_DAYS - 1)));

        // a replayed completion neither succeeds nor counts twice
        assert!(
            db.complete_donation(request.id, &complete, LINA, now)
                .await
                .unwrap()
                .is_none()
        );
        let lina = db.get_profile(LINA).await.unwrap().unwrap();
        assert_eq!(lina.total_donations, 3);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("../../fixtures/donors.sql"))]
    async fn lists_join_the_counterpart_profile(pool: Pool<Postgres>) {
        let db = DBClient::new(pool);
        db.create_request(&sara_asks_lina()).await.unwrap();

        let received = db
            .list_requests(LINA, RequestDirection::Received, None, 1, 10)
            .await
            .unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].counterpart_name.as_deref(), Some("Sara"));
        assert_eq!(received[0].counterpart_city.as_deref(), Some("Karachi"));

        let sent = db
            .list_requests(SARA, RequestDirection::Sent, Some(RequestStatus::Pending), 1, 10)
            .await
            .unwrap();
        assert_eq!(sent[0].counterpart_name.as_deref(), Some("Lina"));

        let accepted = Some(RequestStatus::Accepted);
        assert_eq!(
            db.count_requests(SARA, RequestDirection::Sent, accepted).await.unwrap(),
            0
        );
        assert_eq!(
            db.count_requests(LINA, RequestDirection::Received, None).await.unwrap(),
            1
        );
    }
}

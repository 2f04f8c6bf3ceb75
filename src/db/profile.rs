use super::{DBClient, offset};
use crate::models::{BloodGroup, DonorProfile};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Editable profile fields (everything a donor types in).
#[derive(Debug, Clone)]
pub struct ProfileFields {
    pub name: String,
    pub phone_num: String,
    pub whatsapp_num: String,
    pub age: i32,
    pub city: String,
    pub blood_group: BloodGroup,
}

/// Donor search filters; the caller is always excluded.
#[derive(Debug, Clone)]
pub struct DonorSearch {
    pub exclude_user: Uuid,
    pub blood_group: Option<BloodGroup>,
    pub city: Option<String>,
    pub page: i64,
    pub limit: i64,
}

// Effective availability is part of the predicate so that pages and totals
// only ever count donors who can actually be asked.
const DONOR_SEARCH_FILTER: &str = r#"
    WHERE user_id <> $1
      AND ($2::blood_group IS NULL OR blood_group = $2)
      AND ($3::text IS NULL OR city ILIKE $3 ESCAPE '\')
      AND is_available
      AND (available_after IS NULL OR available_after <= $4)
"#;

/// Donor profile database operations trait
pub trait ProfileExt {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<DonorProfile>, sqlx::Error>;

    /// Insert or update the caller's profile; availability and counters are untouched on update
    async fn upsert_profile(
        &self,
        user_id: Uuid,
        fields: &ProfileFields,
    ) -> Result<DonorProfile, sqlx::Error>;

    /// Page of effectively available donors, best donors first
    async fn search_donors(
        &self,
        search: &DonorSearch,
        now: DateTime<Utc>,
    ) -> Result<Vec<DonorProfile>, sqlx::Error>;

    async fn count_donors(&self, search: &DonorSearch, now: DateTime<Utc>)
    -> Result<i64, sqlx::Error>;

    /// Set the raw availability flag (any cooldown stays in place)
    async fn set_availability(
        &self,
        user_id: Uuid,
        is_available: bool,
    ) -> Result<Option<DonorProfile>, sqlx::Error>;
}

impl ProfileExt for DBClient {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<DonorProfile>, sqlx::Error> {
        sqlx::query_as::<_, DonorProfile>("SELECT * FROM donor_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn upsert_profile(
        &self,
        user_id: Uuid,
        fields: &ProfileFields,
    ) -> Result<DonorProfile, sqlx::Error> {
        sqlx::query_as::<_, DonorProfile>(
            r#"
            INSERT INTO donor_profiles (user_id, name, phone_num, whatsapp_num, age, city, blood_group)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE
            SET name = EXCLUDED.name,
                phone_num = EXCLUDED.phone_num,
                whatsapp_num = EXCLUDED.whatsapp_num,
                age = EXCLUDED.age,
                city = EXCLUDED.city,
                blood_group = EXCLUDED.blood_group,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&fields.name)
        .bind(&fields.phone_num)
        .bind(&fields.whatsapp_num)
        .bind(fields.age)
        .bind(&fields.city)
        .bind(fields.blood_group)
        .fetch_one(&self.pool)
        .await
    }

    async fn search_donors(
        &self,
        search: &DonorSearch,
        now: DateTime<Utc>,
    ) -> Result<Vec<DonorProfile>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT * FROM donor_profiles
            {DONOR_SEARCH_FILTER}
            ORDER BY total_donations DESC, rating DESC, created_at ASC, id ASC
            LIMIT $5 OFFSET $6
            "#
        );

        sqlx::query_as::<_, DonorProfile>(&query)
            .bind(search.exclude_user)
            .bind(search.blood_group)
            .bind(search.city.as_deref().map(city_pattern))
            .bind(now)
            .bind(search.limit)
            .bind(offset(search.page, search.limit))
            .fetch_all(&self.pool)
            .await
    }

    async fn count_donors(
        &self,
        search: &DonorSearch,
        now: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM donor_profiles {DONOR_SEARCH_FILTER}");

        sqlx::query_scalar::<_, i64>(&query)
            .bind(search.exclude_user)
            .bind(search.blood_group)
            .bind(search.city.as_deref().map(city_pattern))
            .bind(now)
            .fetch_one(&self.pool)
            .await
    }

    async fn set_availability(
        &self,
        user_id: Uuid,
        is_available: bool,
    ) -> Result<Option<DonorProfile>, sqlx::Error> {
        sqlx::query_as::<_, DonorProfile>(
            r#"
            UPDATE donor_profiles
            SET is_available = $1, updated_at = NOW()
            WHERE user_id = $2
            RETURNING *
            "#,
        )
        .bind(is_available)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }
}

/// Case-insensitive substring pattern for ILIKE, with LIKE wildcards escaped.
pub(crate) fn city_pattern(city: &str) -> String {
    let mut escaped = String::with_capacity(city.len() + 2);
    escaped.push('%');
    for c in city.trim().chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::{Pool, Postgres};

    const SARA: Uuid = Uuid::from_u128(0x11111111_1111_1111_1111_111111111111);
    const LINA: Uuid = Uuid::from_u128(0x22222222_2222_2222_2222_222222222222);
    const OMAR: Uuid = Uuid::from_u128(0x33333333_3333_3333_3333_333333333333);

    fn o_positive_search() -> DonorSearch {
        DonorSearch {
            exclude_user: SARA,
            blood_group: Some(BloodGroup::OPositive),
            city: None,
            page: 1,
            limit: 10,
        }
    }

    #[test]
    fn city_pattern_is_a_substring_match() {
        assert_eq!(city_pattern("Lahore"), "%Lahore%");
        assert_eq!(city_pattern("  karachi "), "%karachi%");
    }

    #[test]
    fn city_pattern_escapes_wildcards() {
        assert_eq!(city_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(city_pattern("a\\b"), "%a\\\\b%");
    }

    #[sqlx::test(migrations = "./migrations", fixtures("../../fixtures/donors.sql"))]
    async fn cooldown_donor_is_left_out_of_search(pool: Pool<Postgres>) {
        let db = DBClient::new(pool);
        let now = Utc::now();
        let search = o_positive_search();

        // Omar's flag is on but his cooldown runs for ten more days
        let donors = db.search_donors(&search, now).await.unwrap();
        let ids: Vec<Uuid> = donors.iter().map(|d| d.user_id).collect();
        assert_eq!(ids, vec![LINA]);
        assert_eq!(db.count_donors(&search, now).await.unwrap(), 1);

        let later = now + Duration::days(11);
        assert_eq!(db.count_donors(&search, later).await.unwrap(), 2);
        let donors = db.search_donors(&search, later).await.unwrap();
        // more donations rank first
        assert_eq!(donors[0].user_id, OMAR);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("../../fixtures/donors.sql"))]
    async fn search_filters_city_and_excludes_caller(pool: Pool<Postgres>) {
        let db = DBClient::new(pool);
        let now = Utc::now();

        let in_karachi = DonorSearch {
            exclude_user: LINA,
            blood_group: None,
            city: Some("karach".to_string()),
            page: 1,
            limit: 10,
        };
        let donors = db.search_donors(&in_karachi, now).await.unwrap();
        assert_eq!(donors.len(), 1);
        assert_eq!(donors[0].user_id, SARA);

        let own_city = DonorSearch {
            exclude_user: SARA,
            ..in_karachi
        };
        assert_eq!(db.count_donors(&own_city, now).await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "./migrations", fixtures("../../fixtures/donors.sql"))]
    async fn availability_flag_keeps_cooldown(pool: Pool<Postgres>) {
        let db = DBClient::new(pool);
        let now = Utc::now();

        let lina = db.set_availability(LINA, false).await.unwrap().unwrap();
        assert!(!lina.is_effectively_available(now));
        assert_eq!(db.count_donors(&o_positive_search(), now).await.unwrap(), 0);

        let omar = db.set_availability(OMAR, true).await.unwrap().unwrap();
        assert!(omar.available_after.is_some());
        assert!(!omar.is_effectively_available(now));

        assert!(db.set_availability(Uuid::new_v4(), true).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations", fixtures("../../fixtures/donors.sql"))]
    async fn upsert_leaves_counters_alone(pool: Pool<Postgres>) {
        let db = DBClient::new(pool);
        let fields = ProfileFields {
            name: "Lina K".to_string(),
            phone_num: "+92300999".to_string(),
            whatsapp_num: "+92300999".to_string(),
            age: 35,
            city: "Islamabad".to_string(),
            blood_group: BloodGroup::OPositive,
        };

        let updated = db.upsert_profile(LINA, &fields).await.unwrap();
        assert_eq!(updated.name, "Lina K");
        assert_eq!(updated.city, "Islamabad");
        assert_eq!(updated.total_donations, 2);
    }
}

use sqlx::{Pool, Postgres};

mod user;
pub use user::UserExt;

mod profile;
pub use profile::{DonorSearch, ProfileExt, ProfileFields};

mod request;
pub use request::{NewBloodRequest, RequestDirection, RequestExt};

mod notification;
pub use notification::NotificationExt;

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}
impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}

/// OFFSET for a 1-based page.
pub(crate) fn offset(page: i64, limit: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_one_based() {
        assert_eq!(offset(1, 10), 0);
        assert_eq!(offset(3, 10), 20);
        assert_eq!(offset(0, 10), 0);
        assert_eq!(offset(i64::MAX, 10), i64::MAX);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Candidate {
    pub id: i64,
    pub company_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Object key of the stored resume, if one was attached.
    pub resume_key: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload. `email` must already be normalized.
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub company_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub resume_key: Option<String>,
    pub created_by: i64,
}

/// Canonical form used for storage and tenant-scoped duplicate checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Jane.AI@Test.com \n"), "jane.ai@test.com");
    }
}

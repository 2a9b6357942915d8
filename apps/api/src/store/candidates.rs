use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::models::candidate::{Candidate, NewCandidate};
use crate::models::company::{Company, Employee};

/// Tenant-scoped access to companies, employees and candidates.
///
/// Every candidate query takes a `company_id`; nothing here reads across tenants.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn find_company(&self, company_id: i64) -> Result<Option<Company>>;

    async fn find_employee(&self, employee_id: i64) -> Result<Option<Employee>>;

    /// Advisory existence check. `email` must be normalized.
    async fn email_exists(&self, company_id: i64, email: &str) -> Result<bool>;

    /// Inserts the candidate unless `(company_id, email)` is already taken.
    /// Returns `None` when the row already existed.
    async fn insert_if_absent(&self, candidate: NewCandidate) -> Result<Option<Candidate>>;
}

#[derive(Clone)]
pub struct PgCandidateStore {
    pool: PgPool,
}

impl PgCandidateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandidateStore for PgCandidateStore {
    async fn find_company(&self, company_id: i64) -> Result<Option<Company>> {
        Ok(
            sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
                .bind(company_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_employee(&self, employee_id: i64) -> Result<Option<Employee>> {
        Ok(
            sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = $1")
                .bind(employee_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn email_exists(&self, company_id: i64, email: &str) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM candidates WHERE company_id = $1 AND email = $2)",
        )
        .bind(company_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn insert_if_absent(&self, candidate: NewCandidate) -> Result<Option<Candidate>> {
        // The unique constraint decides; a concurrent insert of the same
        // (company_id, email) returns no row instead of an error.
        let inserted = sqlx::query_as::<_, Candidate>(
            r#"
            INSERT INTO candidates
                (company_id, first_name, last_name, email, resume_key, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (company_id, email) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(candidate.company_id)
        .bind(&candidate.first_name)
        .bind(&candidate.last_name)
        .bind(&candidate.email)
        .bind(&candidate.resume_key)
        .bind(candidate.created_by)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_none() {
            debug!(
                company_id = candidate.company_id,
                "Candidate insert skipped by unique constraint"
            );
        }

        Ok(inserted)
    }
}

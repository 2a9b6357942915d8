//! Tenant resolution. Identity itself is owned by the account service; this
//! module only checks that an employee ID really belongs to the company ID it
//! arrived with.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use thiserror::Error;

use crate::errors::AppError;
use crate::models::company::Employee;
use crate::state::AppState;
use crate::store::CandidateStore;

pub const COMPANY_HEADER: &str = "x-company-id";
pub const EMPLOYEE_HEADER: &str = "x-employee-id";

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("company {0} does not exist")]
    UnknownCompany(i64),

    #[error("employee {0} does not exist")]
    UnknownEmployee(i64),

    #[error("employee {employee_id} does not belong to company {company_id}")]
    WrongCompany { company_id: i64, employee_id: i64 },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Re-fetches the employee and its company by ID.
pub async fn resolve_member(
    store: &dyn CandidateStore,
    company_id: i64,
    employee_id: i64,
) -> Result<Employee, TenantError> {
    let employee = store
        .find_employee(employee_id)
        .await?
        .ok_or(TenantError::UnknownEmployee(employee_id))?;
    if employee.company_id != company_id {
        return Err(TenantError::WrongCompany {
            company_id,
            employee_id,
        });
    }
    store
        .find_company(company_id)
        .await?
        .ok_or(TenantError::UnknownCompany(company_id))?;
    Ok(employee)
}

impl From<TenantError> for AppError {
    fn from(e: TenantError) -> Self {
        match e {
            TenantError::UnknownCompany(_) | TenantError::UnknownEmployee(_) => {
                AppError::Unauthorized
            }
            TenantError::WrongCompany { .. } => AppError::Forbidden,
            TenantError::Store(e) => AppError::Internal(e),
        }
    }
}

/// The authenticated company member making the request.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub employee: Employee,
}

impl TenantContext {
    pub fn company_id(&self) -> i64 {
        self.employee.company_id
    }

    pub fn employee_id(&self) -> i64 {
        self.employee.id
    }
}

#[async_trait]
impl FromRequestParts<AppState> for TenantContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let company_id = id_header(&parts.headers, COMPANY_HEADER)?;
        let employee_id = id_header(&parts.headers, EMPLOYEE_HEADER)?;
        let employee =
            resolve_member(state.pipeline.candidates.as_ref(), company_id, employee_id).await?;
        Ok(TenantContext { employee })
    }
}

fn id_header(headers: &HeaderMap, name: &str) -> Result<i64, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or(AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryCandidateStore;

    #[tokio::test]
    async fn test_resolves_member_of_company() {
        let store = InMemoryCandidateStore::new().with_member(1, 10);
        let employee = resolve_member(&store, 1, 10).await.unwrap();
        assert_eq!(employee.id, 10);
        assert_eq!(employee.company_id, 1);
    }

    #[tokio::test]
    async fn test_rejects_employee_of_other_company() {
        let store = InMemoryCandidateStore::new()
            .with_member(1, 10)
            .with_member(2, 20);
        let err = resolve_member(&store, 1, 20).await.unwrap_err();
        assert!(matches!(err, TenantError::WrongCompany { .. }));
        assert!(matches!(AppError::from(err), AppError::Forbidden));
    }

    #[tokio::test]
    async fn test_unknown_employee_is_unauthorized() {
        let store = InMemoryCandidateStore::new();
        let err = resolve_member(&store, 1, 99).await.unwrap_err();
        assert!(matches!(err, TenantError::UnknownEmployee(99)));
        assert!(matches!(AppError::from(err), AppError::Unauthorized));
    }

    #[test]
    fn test_id_header_requires_integer() {
        let mut headers = HeaderMap::new();
        headers.insert(COMPANY_HEADER, "abc".parse().unwrap());
        assert!(id_header(&headers, COMPANY_HEADER).is_err());
        headers.insert(COMPANY_HEADER, " 7 ".parse().unwrap());
        assert_eq!(id_header(&headers, COMPANY_HEADER).unwrap(), 7);
    }
}

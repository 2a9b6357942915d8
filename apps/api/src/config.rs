use std::str::FromStr;

use anyhow::{bail, Context, Result};

pub const DEFAULT_AI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";

/// Which halves of the service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    Api,
    Worker,
    All,
}

impl ServiceRole {
    pub fn runs_api(self) -> bool {
        matches!(self, ServiceRole::Api | ServiceRole::All)
    }

    pub fn runs_workers(self) -> bool {
        matches!(self, ServiceRole::Worker | ServiceRole::All)
    }
}

impl FromStr for ServiceRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(ServiceRole::Api),
            "worker" => Ok(ServiceRole::Worker),
            "all" => Ok(ServiceRole::All),
            other => bail!("SERVICE_ROLE must be one of api, worker, all (got '{other}')"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub ai_api_url: String,
    /// `None` disables the AI strategy; extraction then goes straight to pattern matching.
    pub ai_api_key: Option<String>,
    pub ai_model: String,
    pub ai_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub max_pdf_pages: usize,
    pub max_bulk_files: usize,
    pub worker_concurrency: usize,
    pub job_result_ttl_secs: u64,
    pub service_role: ServiceRole,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            ai_api_url: optional_env("AI_API_URL")
                .unwrap_or_else(|| DEFAULT_AI_API_URL.to_string()),
            ai_api_key: optional_env("AI_API_KEY"),
            ai_model: optional_env("AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
            ai_timeout_secs: parse_env("AI_TIMEOUT_SECS", 30)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            max_pdf_pages: parse_env("MAX_PDF_PAGES", 50)?,
            max_bulk_files: parse_env("MAX_BULK_FILES", 100)?,
            worker_concurrency: parse_env("WORKER_CONCURRENCY", 4)?,
            job_result_ttl_secs: parse_env("JOB_RESULT_TTL_SECS", 86_400)?,
            service_role: optional_env("SERVICE_ROLE")
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(ServiceRole::All),
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Upper bound for a whole multipart request body.
    pub fn max_request_bytes(&self) -> usize {
        self.max_upload_bytes.saturating_mul(self.max_bulk_files.max(1))
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_role_parses_case_insensitively() {
        assert_eq!("API".parse::<ServiceRole>().unwrap(), ServiceRole::Api);
        assert_eq!(" worker ".parse::<ServiceRole>().unwrap(), ServiceRole::Worker);
        assert!("both".parse::<ServiceRole>().is_err());
    }

    #[test]
    fn test_all_role_runs_everything() {
        assert!(ServiceRole::All.runs_api());
        assert!(ServiceRole::All.runs_workers());
        assert!(!ServiceRole::Api.runs_workers());
        assert!(!ServiceRole::Worker.runs_api());
    }
}

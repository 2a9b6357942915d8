use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

/// Blob storage for original resume files.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct S3ResumeStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ResumeStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ResumeStore for S3ResumeStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

        info!("Uploaded resume to s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("S3 delete failed: {e}"))?;
        Ok(())
    }
}

/// Object key for a resume: `resumes/{company_id}/{uuid}-{filename}`.
/// The filename is reduced to a safe character set.
pub fn resume_key(company_id: i64, filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = if safe.trim_matches('.').is_empty() {
        "resume.pdf".to_string()
    } else {
        safe
    };
    format!("resumes/{}/{}-{}", company_id, Uuid::new_v4(), safe)
}

/// Content type stored alongside the blob, guessed from the extension.
pub fn content_type_for(filename: &str) -> &'static str {
    if filename.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_key_is_tenant_prefixed() {
        let key = resume_key(42, "cv.pdf");
        assert!(key.starts_with("resumes/42/"));
        assert!(key.ends_with("-cv.pdf"));
    }

    #[test]
    fn test_resume_key_strips_paths_and_odd_characters() {
        let key = resume_key(1, "../../etc/Jane Doe (final).pdf");
        assert!(key.ends_with("-Jane_Doe__final_.pdf"), "key was {key}");
        assert!(!key.contains(".."));
    }

    #[test]
    fn test_resume_key_falls_back_for_empty_names() {
        assert!(resume_key(1, "").ends_with("-resume.pdf"));
        assert!(resume_key(1, "..").ends_with("-resume.pdf"));
    }

    #[test]
    fn test_content_type_for_pdf() {
        assert_eq!(content_type_for("CV.PDF"), "application/pdf");
        assert_eq!(content_type_for("cv.docx"), "application/octet-stream");
    }
}

use regex::Regex;
use url::Url;
use worker::js_sys::Uint8Array;
use worker::{Fetch, Headers, Method, Request, RequestInit};

use crate::error::ApiError;
use crate::models::UploadEnvelope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: u64,
    /// Lowercase, dot-prefixed.
    pub allowed_extensions: Vec<String>,
}

/// Advisory checks on the chosen file. The processing endpoint repeats its
/// own validation.
pub fn validate_upload(file_name: &str, size: u64, limits: &UploadLimits) -> Result<(), ApiError> {
    if file_name.trim().is_empty() {
        return Err(ApiError::BadRequest("no file selected".to_string()));
    }

    let allowed = file_extension(file_name)
        .is_some_and(|extension| limits.allowed_extensions.contains(&extension));
    if !allowed {
        return Err(ApiError::BadRequest(format!(
            "unsupported file format, please upload {} files",
            limits.allowed_extensions.join(", ")
        )));
    }

    if size == 0 {
        return Err(ApiError::BadRequest("uploaded file is empty".to_string()));
    }

    if size > limits.max_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "file is too large, please upload files smaller than {}MB",
            limits.max_bytes / (1024 * 1024)
        )));
    }

    Ok(())
}

/// Lowercase extension including the dot, taken from the last path segment.
pub fn file_extension(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, extension) = base.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(format!(".{}", extension.to_ascii_lowercase()))
}

pub fn sanitize_file_name(file_name: &str) -> String {
    let unsafe_re = Regex::new(r"[^\p{L}\p{N}._-]+").expect("hardcoded file name regex is valid");
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let cleaned = unsafe_re.replace_all(base.trim(), "_");
    let cleaned = cleaned.trim_matches(['.', '_']);
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("multipart/form-data"))
}

/// Relative download links from the processing service point at its own host.
pub fn absolute_download_url(upstream: &Url, link: &str) -> Result<String, ApiError> {
    Ok(upstream.join(link)?.to_string())
}

/// Posts the untouched multipart body to the processing endpoint.
pub async fn forward_upload(
    endpoint: &Url,
    content_type: &str,
    body: &[u8],
) -> Result<UploadEnvelope, ApiError> {
    let headers = Headers::new();
    headers.set("Content-Type", content_type)?;
    headers.set("Accept", "application/json")?;

    let mut init = RequestInit::new();
    init.with_method(Method::Post)
        .with_headers(headers)
        .with_body(Some(Uint8Array::from(body).into()));

    let request = Request::new_with_init(endpoint.as_str(), &init)?;
    let mut response = Fetch::Request(request).send().await?;
    let status = response.status_code();
    let text = response.text().await?;

    match serde_json::from_str::<UploadEnvelope>(&text) {
        Ok(envelope) if !envelope.success => Err(ApiError::Validation(if envelope.message.is_empty() {
            format!("processing service rejected the file: status {status}")
        } else {
            envelope.message
        })),
        Ok(envelope) if status < 400 => Ok(envelope),
        _ => Err(ApiError::Upstream(format!(
            "processing service failed: status {status}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{
        UploadLimits, absolute_download_url, file_extension, is_multipart, sanitize_file_name,
        validate_upload,
    };

    fn limits() -> UploadLimits {
        UploadLimits {
            max_bytes: 16 * 1024 * 1024,
            allowed_extensions: vec![".xlsx".to_string(), ".xls".to_string()],
        }
    }

    #[test]
    fn extension_is_case_insensitive_and_needs_a_stem() {
        assert_eq!(file_extension("Report.XLSX"), Some(".xlsx".to_string()));
        assert_eq!(file_extension("dir.v2/report"), None);
        assert_eq!(file_extension(".xlsx"), None);
        assert_eq!(file_extension("archive.tar.xls"), Some(".xls".to_string()));
    }

    #[test]
    fn validation_order_and_status_codes() {
        let limits = limits();

        assert_eq!(
            validate_upload("", 10, &limits).expect_err("empty name").status_code(),
            400
        );
        assert!(
            validate_upload("notes.csv", 10, &limits)
                .expect_err("csv rejected")
                .message()
                .contains(".xlsx, .xls")
        );
        assert_eq!(
            validate_upload("data.xlsx", 0, &limits).expect_err("empty file").status_code(),
            400
        );
        assert_eq!(
            validate_upload("data.xlsx", 16 * 1024 * 1024 + 1, &limits)
                .expect_err("too large")
                .status_code(),
            413
        );
        assert!(validate_upload("扣款失败.xls", 16 * 1024 * 1024, &limits).is_ok());
    }

    #[test]
    fn sanitized_names_keep_unicode_letters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("扣款 失败 (1).xlsx"), "扣款_失败_1_.xlsx");
        assert_eq!(sanitize_file_name("  "), "upload");
    }

    #[test]
    fn multipart_detection_ignores_boundary() {
        assert!(is_multipart("multipart/form-data; boundary=----abc"));
        assert!(!is_multipart("application/json"));
    }

    #[test]
    fn download_links_resolve_against_upstream() {
        let upstream = Url::parse("https://processor.example.com/").expect("url");
        assert_eq!(
            absolute_download_url(&upstream, "/download/result.xlsx").expect("join"),
            "https://processor.example.com/download/result.xlsx"
        );
    }
}

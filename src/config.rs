use url::Url;
use worker::Env;

use crate::error::ApiError;
use crate::upload::UploadLimits;

pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:4009/";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 16;
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".xlsx", ".xls"];
pub const DEFAULT_MERGE_COLUMNS: &[&str] = &["所属团队", "所属业务经理"];
pub const DEFAULT_REQUIRED_COLUMNS: &[&str] = &[
    "应还款金额",
    "所属直营中心",
    "所属团队",
    "所属业务经理",
    "客户姓名",
];

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub upstream_url: Url,
    pub max_upload_mb: u64,
    pub allowed_extensions: Vec<String>,
    pub merge_columns: Vec<String>,
    pub required_columns: Vec<String>,
}

impl AppConfig {
    pub fn from_env(env: &Env) -> Result<Self, ApiError> {
        Self::from_lookup(|key| env.var(key).ok().map(|value| value.to_string()))
    }

    /// Builds the config from a variable lookup, falling back to the defaults
    /// for unset or blank variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let upstream_raw = var("UPSTREAM_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());
        let upstream_url = Url::parse(upstream_raw.trim())?;

        let max_upload_mb = match var("MAX_UPLOAD_MB") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|error| {
                ApiError::Internal(format!("MAX_UPLOAD_MB must be a whole number: {error}"))
            })?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };
        if max_upload_mb == 0 {
            return Err(ApiError::Internal(
                "MAX_UPLOAD_MB must be greater than zero".to_string(),
            ));
        }

        let allowed_extensions = var("ALLOWED_EXTENSIONS")
            .map_or_else(|| owned(DEFAULT_ALLOWED_EXTENSIONS), |raw| split_list(&raw))
            .into_iter()
            .map(|extension| normalize_extension(&extension))
            .collect();

        Ok(Self {
            upstream_url,
            max_upload_mb,
            allowed_extensions,
            merge_columns: var("MERGE_COLUMNS")
                .map_or_else(|| owned(DEFAULT_MERGE_COLUMNS), |raw| split_list(&raw)),
            required_columns: var("REQUIRED_COLUMNS")
                .map_or_else(|| owned(DEFAULT_REQUIRED_COLUMNS), |raw| split_list(&raw)),
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(BYTES_PER_MB)
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_bytes: self.max_upload_bytes(),
            allowed_extensions: self.allowed_extensions.clone(),
        }
    }

    pub fn upload_endpoint(&self) -> Result<Url, ApiError> {
        Ok(self.upstream_url.join("upload")?)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream_url: Url::parse(DEFAULT_UPSTREAM_URL)
                .expect("hardcoded default upstream url is valid"),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            allowed_extensions: owned(DEFAULT_ALLOWED_EXTENSIONS),
            merge_columns: owned(DEFAULT_MERGE_COLUMNS),
            required_columns: owned(DEFAULT_REQUIRED_COLUMNS),
        }
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn normalize_extension(extension: &str) -> String {
    let lowered = extension.trim().to_ascii_lowercase();
    if lowered.starts_with('.') {
        lowered
    } else {
        format!(".{lowered}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::AppConfig;

    fn from_map(vars: &[(&str, &str)]) -> AppConfig {
        let vars = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<HashMap<_, _>>();
        AppConfig::from_lookup(|key| vars.get(key).cloned()).expect("valid config")
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(from_map(&[]), AppConfig::default());
    }

    #[test]
    fn lists_are_split_and_extensions_normalized() {
        let config = from_map(&[
            ("ALLOWED_EXTENSIONS", "XLSX, .csv ,"),
            ("MERGE_COLUMNS", "team,manager"),
            ("MAX_UPLOAD_MB", " 4 "),
        ]);

        assert_eq!(config.allowed_extensions, vec![".xlsx", ".csv"]);
        assert_eq!(config.merge_columns, vec!["team", "manager"]);
        assert_eq!(config.max_upload_bytes(), 4 * 1024 * 1024);
    }

    #[test]
    fn upload_endpoint_joins_base_path() {
        let config = from_map(&[("UPSTREAM_URL", "https://processor.example.com/excel/")]);
        assert_eq!(
            config.upload_endpoint().expect("join").as_str(),
            "https://processor.example.com/excel/upload"
        );
    }

    #[test]
    fn zero_or_garbage_upload_limit_is_rejected() {
        assert!(AppConfig::from_lookup(|key| (key == "MAX_UPLOAD_MB").then(|| "0".to_string())).is_err());
        assert!(AppConfig::from_lookup(|key| (key == "MAX_UPLOAD_MB").then(|| "lots".to_string())).is_err());
    }
}

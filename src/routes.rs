use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use worker::{Context, Env, FormEntry, Request, Response, Result, RouteContext, Router};

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::html;
use crate::merge_runs;
use crate::models::{ConfigResponse, HealthResponse, SERVICE_NAME, UploadRenderResponse};
use crate::payload::{self, ResultPayload};
use crate::render::{self, RenderPlan};
use crate::upload;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
}

pub async fn handle(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    let config = match AppConfig::from_env(&env) {
        Ok(config) => config,
        Err(error) => {
            worker::console_error!("invalid worker configuration: {error}");
            return error.into_response();
        }
    };

    let state = AppState { config };

    Router::with_data(state)
        .get("/health", health_route)
        .get("/api/v1/config", config_route)
        .post_async("/api/v1/render", render_route)
        .post_async("/api/v1/render/html", render_html_route)
        .post_async("/api/v1/upload", upload_route)
        .run(req, env)
        .await
}

fn health_route(_req: Request, _ctx: RouteContext<AppState>) -> Result<Response> {
    json_response(&health_response(&Utc::now().to_rfc3339()))
}

fn config_route(_req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    json_response(&config_response(&ctx.data.config))
}

async fn render_route(mut req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    match render_plan_response(&mut req, &ctx.data.config).await {
        Ok((_, plan)) => json_response(&plan),
        Err(error) => error.into_response(),
    }
}

async fn render_html_route(mut req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    match render_plan_response(&mut req, &ctx.data.config).await {
        Ok((payload, plan)) => html_response(html::render_html(&payload, &plan)),
        Err(error) => error.into_response(),
    }
}

async fn upload_route(mut req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    match upload_response(&mut req, &ctx.data.config).await {
        Ok(response) => json_response(&response),
        Err(error) => {
            worker::console_warn!("upload failed: {error}");
            error.into_response()
        }
    }
}

async fn render_plan_response(
    req: &mut Request,
    config: &AppConfig,
) -> Result<(ResultPayload, RenderPlan), ApiError> {
    let query = parse_query(req)?;
    let derive = parse_flag_query(&query, "derive");

    let body = req.text().await?;
    let mut payload = payload::parse_result_payload(&body)?;
    let plan = plan_payload(&mut payload, config, derive);
    Ok((payload, plan))
}

fn plan_payload(payload: &mut ResultPayload, config: &AppConfig, derive: bool) -> RenderPlan {
    if derive {
        let filled = merge_runs::fill_missing_merge_info(payload, &config.merge_columns);
        if !filled.is_empty() {
            worker::console_log!("derived merge info for groups: {}", filled.join(", "));
        }
    }

    let plan = render::render(payload);
    log_plan(&plan);
    plan
}

async fn upload_response(
    req: &mut Request,
    config: &AppConfig,
) -> Result<UploadRenderResponse, ApiError> {
    let content_type = req.headers().get("Content-Type")?.unwrap_or_default();
    if !upload::is_multipart(&content_type) {
        return Err(ApiError::BadRequest(
            "upload must be sent as multipart/form-data".to_string(),
        ));
    }

    let body = req.clone()?.bytes().await?;
    let limits = config.upload_limits();
    if u64::try_from(body.len()).unwrap_or(u64::MAX) > limits.max_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "file is too large, please upload files smaller than {}MB",
            config.max_upload_mb
        )));
    }

    let form = req.form_data().await?;
    let Some(FormEntry::File(file)) = form.get("file") else {
        return Err(ApiError::BadRequest("no file selected".to_string()));
    };
    let file_name = file.name();
    upload::validate_upload(
        &file_name,
        u64::try_from(file.size()).unwrap_or(u64::MAX),
        &limits,
    )?;

    worker::console_log!(
        "forwarding upload: file={}, bytes={}",
        upload::sanitize_file_name(&file_name),
        file.size()
    );

    let envelope = upload::forward_upload(&config.upload_endpoint()?, &content_type, &body).await?;
    let preview = envelope.preview_data.ok_or_else(|| {
        ApiError::Upstream("processing service returned no preview data".to_string())
    })?;

    let mut payload = ResultPayload::from_value(preview)?;
    let plan = plan_payload(&mut payload, config, true);
    let html = html::render_html(&payload, &plan);

    let download_url = envelope
        .download_url
        .as_deref()
        .map(|link| upload::absolute_download_url(&config.upstream_url, link))
        .transpose()?;

    Ok(UploadRenderResponse {
        message: envelope.message,
        plan,
        html,
        stats: envelope.stats,
        download_url,
        excel_file_name: envelope.excel_file_name,
    })
}

fn log_plan(plan: &RenderPlan) {
    for warning in &plan.warnings {
        match &warning.column {
            Some(column) => worker::console_warn!(
                "render warning [{}] group={} column={}: {}",
                warning.code.as_str(),
                warning.group,
                column,
                warning.message
            ),
            None => worker::console_warn!(
                "render warning [{}] group={}: {}",
                warning.code.as_str(),
                warning.group,
                warning.message
            ),
        }
    }

    worker::console_log!(
        "render completed: groups={}, warnings={}",
        plan.groups.len(),
        plan.warnings.len()
    );
}

pub fn health_response(timestamp: &str) -> HealthResponse {
    HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: timestamp.to_string(),
    }
}

pub fn config_response(config: &AppConfig) -> ConfigResponse {
    ConfigResponse {
        max_file_size_mb: config.max_upload_mb,
        allowed_extensions: config.allowed_extensions.clone(),
        required_columns: config.required_columns.clone(),
        merge_columns: config.merge_columns.clone(),
    }
}

fn json_response<T>(payload: &T) -> Result<Response>
where
    T: Serialize,
{
    let mut response = Response::from_json(payload)?;
    response.headers_mut().set("Cache-Control", "no-store")?;
    Ok(response)
}

fn html_response(body: String) -> Result<Response> {
    let mut response = Response::from_html(body)?;
    response.headers_mut().set("Cache-Control", "no-store")?;
    Ok(response)
}

fn parse_query(req: &Request) -> Result<HashMap<String, String>, ApiError> {
    let url = req.url()?;
    let query = url
        .query_pairs()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect::<HashMap<_, _>>();
    Ok(query)
}

pub fn parse_flag_query(query: &HashMap<String, String>, name: &str) -> bool {
    query.get(name).is_some_and(|value| {
        let lowered = value.trim().to_ascii_lowercase();
        lowered == "true" || lowered == "1" || lowered == "yes"
    })
}

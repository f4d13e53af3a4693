pub mod config;
pub mod error;
pub mod html;
pub mod merge_runs;
pub mod models;
pub mod payload;
pub mod render;
pub mod routes;
pub mod upload;

use worker::{Context, Env, Request, Response, Result, event};

#[event(fetch)]
async fn fetch(req: Request, env: Env, ctx: Context) -> Result<Response> {
    routes::handle(req, env, ctx).await
}

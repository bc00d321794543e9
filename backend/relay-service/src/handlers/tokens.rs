use actix_web::{web, HttpResponse, Result as ActixResult};
use serde_json::json;
use std::sync::Arc;

use super::ApiResponse;
use crate::services::PushService;

/// Issue a fresh token for a new client
///
/// POST /token/
///
/// The token is what a live client sends as its handshake frame and what
/// producers address items to.
pub async fn issue_token(service: web::Data<Arc<PushService>>) -> ActixResult<HttpResponse> {
    let token = service.issue_token().await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(json!({ "token": token }))))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/token/", web::post().to(issue_token));
}

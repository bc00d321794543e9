/// Mobile client registration
use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{field, ApiResponse};
use crate::services::PushService;

#[derive(Debug, Deserialize)]
pub struct RegisterMobilePayload {
    pub token: Option<String>,
    pub gcmid: Option<String>,
}

/// Bind a GCM registration id to a token
///
/// POST /gcm/
pub async fn register_mobile(
    service: web::Data<Arc<PushService>>,
    form: web::Form<RegisterMobilePayload>,
) -> ActixResult<HttpResponse> {
    service
        .register_mobile_client(field(&form.gcmid), field(&form.token))
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(json!({ "registered": true }))))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/gcm/", web::post().to(register_mobile));
}

use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::Deserialize;
use std::sync::Arc;

use super::{field, ApiResponse};
use crate::services::PushService;

#[derive(Debug, Deserialize)]
pub struct PoolForm {
    pub token: Option<String>,
}

/// Hand stored items to a client that was not live, one frame per line
///
/// POST /pool/
pub async fn retrieve_pool(
    service: web::Data<Arc<PushService>>,
    form: web::Form<PoolForm>,
) -> ActixResult<HttpResponse> {
    let token = field(&form.token);
    if token.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ApiResponse::<()>::err(
            "token required".to_string(),
        )));
    }

    let items = service.retrieve_pending(token).await?;

    let mut body = String::new();
    for item in &items {
        body.push_str(&item.to_frame_line()?);
        body.push('\n');
    }

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(body))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/pool/", web::post().to(retrieve_pool));
}

/// Live connection status
///
/// The live connections themselves are plain TCP on the relay port; these
/// endpoints only report on them.
use actix_web::{web, HttpResponse, Result as ActixResult};
use serde_json::json;
use std::sync::Arc;

use crate::services::PushService;

/// Endpoint: GET /api/v1/live/status/{token}
pub async fn live_status(
    path: web::Path<String>,
    service: web::Data<Arc<PushService>>,
) -> ActixResult<HttpResponse> {
    let token = path.into_inner();
    let connected = service.is_live(&token).await;

    Ok(HttpResponse::Ok().json(json!({
        "token": token,
        "connected": connected
    })))
}

/// Endpoint: GET /api/v1/live/metrics
pub async fn live_metrics(service: web::Data<Arc<PushService>>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "live_connections": service.live_connection_count().await
    })))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/live")
            .route("/status/{token}", web::get().to(live_status))
            .route("/metrics", web::get().to(live_metrics)),
    );
}

use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{field, ApiResponse};
use crate::models::{parse_timestamp, NewPushItem, Priority};
use crate::services::PushService;

/// Form body of a push submission
#[derive(Debug, Default, Deserialize)]
pub struct PushForm {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub token: Option<String>,
    pub timestamp: Option<String>,
    pub priority: Option<String>,
}

impl From<PushForm> for NewPushItem {
    fn from(form: PushForm) -> Self {
        NewPushItem {
            title: field(&form.title).to_string(),
            body: field(&form.body).to_string(),
            url: form.url.filter(|u| !u.is_empty()),
            token: field(&form.token).to_string(),
            unix_timestamp: parse_timestamp(form.timestamp.as_deref()),
            priority: i64::from(Priority::from_raw(form.priority.as_deref())),
        }
    }
}

/// Submit a push item
///
/// POST /push/
///
/// The response says the item was stored; whether it reached anyone is not reported.
pub async fn submit_push(
    service: web::Data<Arc<PushService>>,
    form: web::Form<PushForm>,
) -> ActixResult<HttpResponse> {
    let (item, _) = service.submit(form.into_inner().into()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(json!({ "id": item.id }))))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/push/", web::post().to(submit_push));
}

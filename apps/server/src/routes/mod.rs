//! HTTP surface: a liveness probe and the websocket upgrade. Everything
//! else travels over the event stream.

use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use time::OffsetDateTime;

use crate::state::app_state::AppState;
use crate::ws;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    app_version: &'static str,
    kv: &'static str,
    rooms: usize,
    time: String,
}

async fn health(app_state: web::Data<AppState>) -> impl Responder {
    let now = OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        app_version: env!("CARGO_PKG_VERSION"),
        kv: if app_state.kv.is_connected() {
            "connected"
        } else {
            "degraded"
        },
        rooms: app_state.registry.room_count(),
        time: now,
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/ws", web::get().to(ws::session::upgrade));
}

use std::sync::Arc;

use actix_web::{get, web, HttpResponse};
use chrono::Utc;

use crate::bot::BotStatus;
use crate::history::TweetHistory;

#[get("/health")]
pub async fn health_check(status: web::Data<Arc<BotStatus>>, history: web::Data<Arc<TweetHistory>>) -> HttpResponse {
    let now = Utc::now();
    let snapshot = status.snapshot(&history, now);
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": now.to_rfc3339(),
        "last_tick": snapshot.last_tick.map(|t| t.to_rfc3339()),
    }))
}

#[get("/status")]
pub async fn bot_status(status: web::Data<Arc<BotStatus>>, history: web::Data<Arc<TweetHistory>>) -> HttpResponse {
    let now = Utc::now();
    let snapshot = status.snapshot(&history, now);
    HttpResponse::Ok().json(serde_json::json!({
        "cycles": snapshot.cycles,
        "last_tick": snapshot.last_tick,
        "last_success": snapshot.last_success,
        "last_reason": snapshot.last_reason,
        "posts_today": snapshot.posts_today,
        "capacity_pressure": snapshot.capacity_pressure,
        "recent_posts": history.recent(10),
    }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check).service(bot_status);
}

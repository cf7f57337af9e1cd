use axum::{http::StatusCode, response::Json};

pub async fn health_check_handler() -> Result<Json<serde_json::Value>, StatusCode> {
    let health_status = serde_json::json!({
        "status": "healthy",
        "message": "Redis fleet orchestrator is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    });

    Ok(Json(health_status))
}

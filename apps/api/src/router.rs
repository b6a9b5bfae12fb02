use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::appointment_routes;
use appointment_cell::AppointmentServices;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, services: Arc<AppointmentServices>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic appointments API is running!" }))
        .nest("/appointments", appointment_routes(config, services))
}

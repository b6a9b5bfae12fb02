// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::AppointmentServices;

pub fn appointment_routes(config: Arc<AppConfig>, services: Arc<AppointmentServices>) -> Router {
    // Every appointment route requires a valid token; roles are checked per handler
    let protected_routes = Router::new()
        // Booking
        .route("/", post(handlers::create_appointment))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).delete(handlers::cancel_appointment),
        )
        .route("/{appointment_id}/approve", put(handlers::approve_appointment))
        .route("/{appointment_id}/reject", put(handlers::reject_appointment))

        // Listings
        .route("/mine", get(handlers::get_my_appointments))
        .route("/doctor", get(handlers::get_doctor_appointments))
        .route("/available-dates/{clinic_id}", get(handlers::get_available_dates))

        // Clinic day board
        .route("/today", get(handlers::get_today_appointments))
        .route("/date", get(handlers::get_appointments_by_date))
        .route("/forward/{appointment_id}", put(handlers::forward_status))
        .route("/reverse/{appointment_id}", put(handlers::reverse_status))

        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(services)
}

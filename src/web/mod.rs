use axum::{
    middleware::from_fn_with_state,
    response::Redirect,
    routing::{get, get_service, post, put},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod middleware;
pub mod routes;

use self::middleware::auth as auth_middleware;
use self::routes::{
    attendance, auth, billing, children, dashboard, events, forms, health, incidents,
    registrations, sessions, waitlist,
};

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/parent", get(dashboard::parent_dashboard_handler))
        .route("/dashboard/staff", get(dashboard::staff_dashboard_handler))
        .route("/dashboard/admin", get(dashboard::admin_dashboard_handler))
        .route(
            "/children",
            get(children::list_children_handler).post(children::create_child_handler),
        )
        .route(
            "/children/:child_id",
            get(children::child_handler).put(children::update_child_handler),
        )
        .route(
            "/sessions",
            get(sessions::list_sessions_handler).post(sessions::create_session_handler),
        )
        .route(
            "/sessions/:session_id",
            get(sessions::session_handler).put(sessions::update_session_handler),
        )
        .route("/sessions/:session_id/open", post(sessions::open_session_handler))
        .route("/sessions/:session_id/close", post(sessions::close_session_handler))
        .route(
            "/sessions/:session_id/registrations",
            get(sessions::session_registrations_handler),
        )
        .route(
            "/sessions/:session_id/waitlist",
            get(sessions::session_waitlist_handler),
        )
        .route(
            "/sessions/:session_id/attendance",
            get(attendance::roster_handler).post(attendance::record_attendance_handler),
        )
        .route(
            "/registrations",
            get(registrations::list_registrations_handler).post(registrations::register_handler),
        )
        .route(
            "/registrations/:registration_id/cancel",
            post(registrations::cancel_registration_handler),
        )
        .route("/waitlist/sweep", post(waitlist::sweep_handler))
        .route("/waitlist/:entry_id/accept", post(waitlist::accept_offer_handler))
        .route("/waitlist/:entry_id/decline", post(waitlist::decline_offer_handler))
        .route("/waitlist/:entry_id/remove", post(waitlist::remove_entry_handler))
        .route("/waitlist/:entry_id/move", post(waitlist::move_entry_handler))
        .route(
            "/incidents",
            get(incidents::list_incidents_handler).post(incidents::report_incident_handler),
        )
        .route(
            "/incidents/:incident_id/notified",
            post(incidents::guardian_notified_handler),
        )
        .route(
            "/incidents/:incident_id/resolve",
            post(incidents::resolve_incident_handler),
        )
        .route(
            "/forms",
            get(forms::list_forms_handler).post(forms::create_form_handler),
        )
        .route("/forms/:form_id", put(forms::update_form_handler))
        .route("/forms/:form_id/publish", post(forms::publish_form_handler))
        .route("/forms/:form_id/archive", post(forms::archive_form_handler))
        .route("/forms/:form_id/published", get(forms::published_form_handler))
        .route(
            "/forms/:form_id/submissions",
            get(forms::list_submissions_handler).post(forms::submit_form_handler),
        )
        .route("/billing/statement", get(billing::statement_handler))
        .route("/billing/payments", post(billing::record_payment_handler))
        .route("/billing/adjustments", post(billing::record_adjustment_handler))
        .route("/events", get(events::recent_events_handler))
}

/// The full application: public pages, the authenticated surface and static
/// assets.
pub fn build_router(state: AppState) -> Router {
    // Protected routes under one middleware layer
    let protected_routes = Router::new()
        .route("/dashboard", get(dashboard::dashboard_handler))
        .route(
            "/dashboard/waitlist/:entry_id",
            post(dashboard::offer_command_handler),
        )
        .route(
            "/forms/:form_id",
            get(forms::form_page_handler).post(forms::submit_form_page_handler),
        )
        .route("/logout", post(auth::logout_handler))
        .nest("/api", api_routes())
        .layer(from_fn_with_state(
            state.clone(),
            auth_middleware::require_auth,
        ));

    Router::new()
        // Public routes
        .route("/", get(|| async { Redirect::to("/dashboard") }))
        .route("/health", get(health::health_handler))
        .route("/login", get(auth::login_page).post(auth::login_handler))
        .merge(protected_routes)
        .nest_service(
            "/assets",
            get_service(ServeDir::new("assets")).layer(SetResponseHeaderLayer::if_not_present(
                CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            )),
        )
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

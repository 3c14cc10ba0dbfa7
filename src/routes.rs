// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, csv_upload, documents, flags, history, oauth, test},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Document uploads arrive base64-encoded inside JSON.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Assembles the main application router.
///
/// * Public: auth, OAuth and the leaderboard.
/// * User: tests, history, flags and topic documents, behind a valid token.
/// * Admin: content management and moderation, behind an admin token.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/oauth/{provider}", get(oauth::authorize))
        .route("/oauth/{provider}/callback", get(oauth::callback));

    let user_routes = Router::new()
        .route("/test", post(test::create_test))
        .route("/test/{id}/{test_type}", get(test::get_test).post(test::submit_test))
        .route("/testhistory/{user_id}", get(history::test_history))
        .route("/stats/{user_id}", get(history::user_stats))
        .route("/learninghistory/{user_id}", get(history::learning_history))
        .route("/topics/{id}/progress", post(history::record_progress))
        .route("/topics/{id}/document", get(documents::download_document))
        .route("/flags", post(flags::create_flag))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/categories", get(admin::list_categories).post(admin::create_category))
        .route("/topics", post(admin::create_topic))
        .route("/questions", post(admin::create_question))
        .route(
            "/questions/{id}",
            get(admin::get_question)
                .put(admin::update_question)
                .delete(admin::delete_question),
        )
        .route("/flags", get(flags::list_flags))
        .route("/flags/{id}", get(flags::get_flag).post(flags::update_flag))
        .route("/csvupload", post(csv_upload::upload_csv))
        .route("/docupload", post(documents::upload_document))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        // Auth runs first, then the admin check
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .route("/api/ranks", get(history::ranks))
        .nest("/api", user_routes)
        .nest("/api/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

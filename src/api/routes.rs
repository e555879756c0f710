use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Headroom for multipart framing and text fields on top of file bytes.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let limits = &state.config.uploads;
    let upload_limit = (limits.max_guest_upload_size as usize).saturating_add(MULTIPART_OVERHEAD);
    let cover_limit = (limits.max_cover_image_size as usize).saturating_add(MULTIPART_OVERHEAD);
    let batch_limit = limits.batch_body_limit();

    let mut router = Router::new()
        // Guest uploads
        .route(
            "/events/:event_id/uploads",
            post(handlers::submit_upload)
                .layer(DefaultBodyLimit::max(upload_limit))
                .get(handlers::list_event_uploads),
        )
        .route(
            "/events/:event_id/uploads/batch",
            post(handlers::submit_batch).layer(DefaultBodyLimit::max(batch_limit)),
        )
        .route("/events/:event_id/stats", get(handlers::event_stats))
        .route(
            "/events/:event_id/cover",
            post(handlers::upload_cover).layer(DefaultBodyLimit::max(cover_limit)),
        )
        // Moderation
        .route("/moderation/queue", get(handlers::moderation_queue))
        .route("/moderation/stats", get(handlers::moderation_stats))
        .route("/moderation/approve", post(handlers::approve_upload))
        .route("/moderation/reject", post(handlers::reject_upload))
        // Reactions
        .route(
            "/uploads/:upload_id/reactions",
            get(handlers::reaction_summary).post(handlers::toggle_reaction),
        )
        // Static content (local backend public URLs)
        .route("/static/*key", get(handlers::serve_static))
        // Internal
        .route("/_internal/events/:event_id", put(handlers::put_event))
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

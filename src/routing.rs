//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};

use crate::{
    AppState, Error,
    auth::{
        auth_guard, github_callback, google_callback, log_in, log_out, sign_up,
        start_github_auth, start_google_auth,
    },
    endpoints,
    expense::{
        create_expense_endpoint, delete_expense_endpoint, delete_media_endpoint,
        get_media_endpoint, list_expenses_endpoint, update_expense_endpoint,
    },
    media::MAX_UPLOAD_SIZE,
    report::get_report_endpoint,
};

/// The largest request body accepted on the expense routes: one media file plus the form fields.
pub const EXPENSE_BODY_LIMIT: usize = MAX_UPLOAD_SIZE + 1024 * 1024;

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::SIGN_UP, post(sign_up))
        .route(endpoints::LOG_IN, post(log_in))
        .route(endpoints::LOG_OUT, post(log_out))
        .route(endpoints::GOOGLE_AUTH, get(start_google_auth))
        .route(endpoints::GOOGLE_CALLBACK, get(google_callback))
        .route(endpoints::GITHUB_AUTH, get(start_github_auth))
        .route(endpoints::GITHUB_CALLBACK, get(github_callback))
        .route(endpoints::MEDIA, get(get_media_endpoint));

    let protected_routes = Router::new()
        .route(
            endpoints::EXPENSES,
            post(create_expense_endpoint).get(list_expenses_endpoint),
        )
        .route(
            endpoints::EXPENSE,
            put(update_expense_endpoint).delete(delete_expense_endpoint),
        )
        .route(endpoints::MEDIA, delete(delete_media_endpoint))
        .route(endpoints::REPORT, get(get_report_endpoint))
        .route_layer(DefaultBodyLimit::max(EXPENSE_BODY_LIMIT))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The fallback for requests that match no route.
async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}

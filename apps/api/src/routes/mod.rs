pub mod choices;
pub mod email;
pub mod favourites;
pub mod groups;
pub mod health;
pub mod signals;
pub mod trends;
pub mod users;

use axum::{routing::get, Router};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/signals", signals::router())
        .nest("/trends", trends::router())
        .nest("/users", users::router())
        .nest("/user-groups", groups::router())
        .nest("/favourites", favourites::router())
        .nest("/choices", choices::router())
        .nest("/email", email::router())
        .with_state(state)
}

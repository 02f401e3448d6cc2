use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod cart;
pub mod categories;
pub mod dashboard;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod payments;
pub mod products;
pub mod users;

// Build the API router without binding state; it is provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/categories", categories::router())
        .nest("/products", products::router())
        .nest("/carts", cart::router())
        .nest("/orders", orders::router())
        .nest("/payments", payments::router())
        .nest("/dashboard", dashboard::router())
}

// HTTP server setup (Axum)
pub mod app;
pub mod cookie;
pub mod middleware;
pub mod response;
pub mod routes;

pub use app::*;

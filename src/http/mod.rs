//! HTTP surface: health, read-only player view, static client files

pub mod routes;

pub use routes::build_router;

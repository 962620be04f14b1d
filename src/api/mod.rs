pub mod handlers;
pub mod routes;
pub mod shortcode;

pub use routes::create_api_router;

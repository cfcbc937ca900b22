pub mod detail;
pub mod handlers;
pub mod middleware;
pub mod report;
pub mod routes;
pub mod search;

pub use routes::create_router;

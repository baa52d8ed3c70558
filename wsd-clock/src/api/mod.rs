//! HTTP API handlers for wsd-clock

pub mod health;
pub mod status;
pub mod time;

pub use health::health_routes;
pub use status::{get_guests, get_stream};
pub use time::get_time;

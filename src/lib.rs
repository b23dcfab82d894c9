pub mod clock;
pub mod config;
pub mod engine;
pub mod fee;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;

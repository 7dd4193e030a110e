pub mod builder;
pub mod handler;
pub mod listener;
pub mod shutdown;

pub use builder::ServerBuilder;
pub use handler::HealthHandler;
pub use shutdown::shutdown_signal;

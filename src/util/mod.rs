//! Utility modules

mod socket;
mod tracing_setup;

pub use socket::is_endpoint_writable;
pub use tracing_setup::init_tracing;

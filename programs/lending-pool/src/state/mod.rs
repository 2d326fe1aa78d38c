pub mod pool_config;
pub mod position;
pub mod revocation_registry;

pub use pool_config::*;
pub use position::*;
pub use revocation_registry::*;

pub mod api_config;
pub mod nodepoint_config;
pub mod stats_config;

pub use api_config::ApiConfig;
pub use nodepoint_config::*;
pub use stats_config::*;

pub mod adapters;
pub mod config;

pub use adapters::{InMemorySaleRepository, MySqlSaleRepository, ZenoPayAdapter};
pub use config::{ZenoPayConfig, checkout_settings_from_env};

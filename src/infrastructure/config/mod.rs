pub mod checkout_config;
pub mod zenopay_config;

pub use checkout_config::checkout_settings_from_env;
pub use zenopay_config::ZenoPayConfig;

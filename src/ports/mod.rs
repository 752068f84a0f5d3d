pub mod checkout_listener;
pub mod sale_repository_port;
pub mod zenopay_port;

pub use checkout_listener::CheckoutListener;
pub use sale_repository_port::SaleRepositoryPort;
pub use zenopay_port::ZenoPayPort;

pub mod background;
pub mod checkout_service;
pub mod dto;
pub mod settings;
pub mod ussd_session;

#[cfg(test)]
pub(crate) mod test_support;

pub use background::spawn_session_sweeper;
pub use checkout_service::{CheckoutService, SaleRecorder};
pub use dto::{ErrorResponse, ManualReferenceRequest, OpenSessionRequest, SessionSnapshot};
pub use settings::CheckoutSettings;
pub use ussd_session::UssdPaymentSession;

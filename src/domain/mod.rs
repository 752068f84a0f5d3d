pub mod entities;
pub mod errors;
pub mod reference;
pub mod sale;
pub mod ussd;
pub mod value_objects;

pub use entities::{CartItem, Customer, Operator, Order};
pub use errors::{DomainError, DomainResult};
pub use sale::{Sale, SaleContext, SaleItem, SalePayment, SaleTotals};
pub use ussd::{Attempt, PollOutcome, UssdPaymentMachine};
pub use value_objects::{MobileProvider, Money, OrderStatus, PaymentChannel, TaxPolicy, UssdStatus};

// apps/payment_service/src/services/mod.rs

pub mod email_mock;
pub mod payment_mock;
pub mod pesapal;

pub use email_mock::MockEmailNotifier;
pub use payment_mock::MockGateway;
pub use pesapal::PesapalGateway;

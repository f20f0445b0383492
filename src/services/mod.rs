pub mod audit;
pub mod gate;
pub mod ledger;
pub mod oracle;
pub mod reaper;
pub mod webhook;

pub use audit::AuditSink;
pub use gate::{Actor, CapabilityGate};
pub use ledger::LedgerService;
pub use oracle::PriceOracle;
pub use reaper::Reaper;
pub use webhook::WebhookDispatcher;

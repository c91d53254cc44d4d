// Scenario tests against a scripted transport
// Engine: node rotation, retry classification, budgets, deadline, cancellation
// Chunking: ordered multi-chunk submission
// Poller: pending vs resolved receipts and records
// Payment: cost negotiation and payment attachment
// Discovery: address-book refresh and the periodic updater


pub mod chunking;
pub mod discovery;
pub mod engine;

pub mod artifacts;
pub mod ledger;

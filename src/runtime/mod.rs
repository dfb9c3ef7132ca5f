pub mod args;
pub mod shutdown;
pub mod status;

pub use args::{parse_runtime_args, RuntimeArgs};
pub use shutdown::{escalate_interrupts, FORCE_QUIT_EXIT_CODE};
pub use status::{emit_config_status, emit_ledger_status};

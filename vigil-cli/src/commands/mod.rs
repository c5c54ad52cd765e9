pub mod explain;
pub mod monitor;

pub use explain::cmd_explain;
pub use monitor::{cmd_monitor, cmd_report, cmd_status};

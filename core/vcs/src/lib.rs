//! Change Monitor: wraps the VCS command interface and exposes fast,
//! commit-to-commit change detection over the managed subtree.

pub mod change_monitor;

pub use change_monitor::{managed_path, ChangeMonitor, ChangeType};

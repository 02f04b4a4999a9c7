mod status_monitor;

pub use status_monitor::StatusMonitor;

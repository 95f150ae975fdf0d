/// Log source collectors
pub mod log_tailer;

pub use log_tailer::LogTailer;

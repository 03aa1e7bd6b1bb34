//! Application state behind the `los-notify` binary.

pub mod dispatch;
pub mod identity;
pub mod settings;
#[allow(dead_code)]
pub mod store;
pub mod toasts;

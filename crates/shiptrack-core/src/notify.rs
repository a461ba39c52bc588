//! Notification sinks

use crate::traits::Notifier;
use tracing::info;

/// Emits notifications as `info` events on the `shiptrack::notify` target
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!(target: "shiptrack::notify", title, body, "notification");
    }
}

/// Drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _title: &str, _body: &str) {}
}

/// Alert gating and delivery
pub mod alert_gate;
pub mod notifier;

pub use alert_gate::AlertGate;
#[cfg(test)]
pub use notifier::MockNotifier;
pub use notifier::{Notifier, WebhookNotifier};

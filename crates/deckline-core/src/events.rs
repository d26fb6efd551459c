use serde_json::Value;

use crate::errors::ConnectionError;
use crate::messages::{
    BroadcastMessage, InfoMessage, ListChangeMessage, NotificationClickedMessage, SettingsMessage,
};

/// Session events delivered to the embedding application over the event
/// channel. Entity messages with a matching registered handler never appear
/// here; they go through the dispatcher instead.
#[derive(Debug)]
pub enum DeckEvent {
    /// Pairing confirmation with host details and current settings.
    Info(InfoMessage),

    /// The user edited the plugin's settings on the host.
    Settings(SettingsMessage),

    /// Host-wide broadcast, e.g. a page change.
    Broadcast(BroadcastMessage),

    /// A choice list inside an action was opened or changed.
    ListChanged(ListChangeMessage),

    /// An option on a plugin notification was clicked.
    NotificationOptionClicked(NotificationClickedMessage),

    /// An entity message addressed to this plugin that no registered handler
    /// matched. Carries the raw envelope.
    Unhandled { envelope: Value },

    /// Fired exactly once per successful connect. `reason` is `None` when
    /// the host asked the plugin to close, otherwise the triggering error.
    Disconnected { reason: Option<ConnectionError> },
}

impl DeckEvent {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info(_) => "info",
            Self::Settings(_) => "settings",
            Self::Broadcast(_) => "broadcast",
            Self::ListChanged(_) => "list_changed",
            Self::NotificationOptionClicked(_) => "notification_option_clicked",
            Self::Unhandled { .. } => "unhandled",
            Self::Disconnected { .. } => "disconnected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(DeckEvent::Info(InfoMessage::default()).label(), "info");
        assert_eq!(
            DeckEvent::Disconnected { reason: None }.label(),
            "disconnected"
        );
        assert_eq!(
            DeckEvent::Unhandled { envelope: Value::Null }.label(),
            "unhandled"
        );
    }
}

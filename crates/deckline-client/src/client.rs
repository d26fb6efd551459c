use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use deckline_core::messages::{ActionDataUpdate, InfoMessage, NotificationOption};
use deckline_core::{
    CoerceError, ConnectionError, DeckEvent, EntityId, InstanceId, NotificationId,
    OutboundMessage, PluginId, TypedValue, ValueKind,
};

use crate::config::ClientConfig;
use crate::connector::{construct_identity, CANONICAL_ID_MAX_LEN};
use crate::props::PropertiesStore;
use crate::registry::HandlerRegistry;
use crate::session::Session;
use crate::update;

/// The public surface of the runtime client. Owns at most one live session;
/// all senders validate, consult the per-session caches, and return true
/// only after a real write reached the wire.
pub struct DeckClient {
    config: ClientConfig,
    registry: Arc<HandlerRegistry>,
    events_tx: mpsc::Sender<DeckEvent>,
    session: Mutex<Option<Arc<Session>>>,
    props: Mutex<Option<PropertiesStore>>,
}

impl DeckClient {
    /// Build a client around a registry of handlers. The returned receiver
    /// carries session events (info, settings, broadcasts, unhandled
    /// messages, disconnects) for the lifetime of the client, across
    /// reconnects.
    pub fn new(config: ClientConfig, registry: HandlerRegistry) -> (Self, mpsc::Receiver<DeckEvent>) {
        let (events_tx, events_rx) = mpsc::channel(config.event_queue.max(1));
        (
            Self {
                config,
                registry: Arc::new(registry),
                events_tx,
                session: Mutex::new(None),
                props: Mutex::new(None),
            },
            events_rx,
        )
    }

    fn live_session(&self) -> Option<Arc<Session>> {
        self.session.lock().as_ref().filter(|s| s.is_connected()).cloned()
    }

    /// Connect, pair, and start the read loop. A no-op success while a live
    /// session exists. A fresh session starts with empty caches and hold
    /// state.
    pub async fn connect_and_listen(&self) -> Result<(), ConnectionError> {
        if self.live_session().is_some() {
            return Ok(());
        }

        let session = Session::connect(
            &self.config,
            Arc::clone(&self.registry),
            self.events_tx.clone(),
        )
        .await?;
        session.pair().await?;
        session.listen();

        *self.session.lock() = Some(session);
        Ok(())
    }

    /// Close the live session, if any, and persist loaded properties.
    pub async fn close(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            session.close(None).await;
        }
        self.store_properties();
    }

    pub fn is_connected(&self) -> bool {
        self.live_session().is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.live_session().is_some_and(|s| s.is_listening())
    }

    pub fn plugin_id(&self) -> &PluginId {
        &self.config.plugin_id
    }

    // --- Inbound state accessors ---

    /// Hold status of an action: `None` after a plain press or when idle,
    /// `Some(true)` while held down, `Some(false)` just after release.
    pub fn query_held(&self, action_id: &str) -> Option<bool> {
        self.live_session()?
            .shared()
            .held
            .query(&EntityId::from_raw(action_id))
    }

    /// Last host-info record, from the pairing confirmation.
    pub fn info(&self) -> Option<InfoMessage> {
        self.live_session()?.shared().info.read().clone()
    }

    pub fn setting(&self, name: &str) -> Option<String> {
        self.live_session()?
            .shared()
            .settings
            .read()
            .get(name)
            .map(str::to_owned)
    }

    /// Read a setting through the data coercion table.
    pub fn setting_typed(
        &self,
        name: &str,
        kind: ValueKind,
    ) -> Option<Result<TypedValue, CoerceError>> {
        self.live_session()?.shared().settings.read().get_typed(name, kind)
    }

    /// Last value this session pushed for a state id.
    pub fn last_state_value(&self, state_id: &str) -> Option<String> {
        self.live_session()?.shared().caches.last_state(state_id)
    }

    // --- Update senders ---

    pub async fn send_state_update(&self, state_id: &str, value: &str) -> bool {
        self.send_state_update_opts(state_id, value, false, false).await
    }

    pub async fn send_state_update_opts(
        &self,
        state_id: &str,
        value: &str,
        allow_empty: bool,
        force: bool,
    ) -> bool {
        if state_id.is_empty() || (!allow_empty && value.is_empty()) {
            return false;
        }
        let Some(session) = self.live_session() else {
            return false;
        };
        if !force && session.shared().caches.state_matches(state_id, value) {
            return false;
        }

        let sent = session
            .send(&OutboundMessage::StateUpdate {
                id: EntityId::from_raw(state_id),
                value: value.to_owned(),
            })
            .await;
        if sent {
            session.shared().caches.record_state(state_id, value);
            tracing::debug!(state_id, "State update sent");
        }
        sent
    }

    pub async fn send_choice_update(&self, list_id: &str, values: &[String]) -> bool {
        self.send_choice_update_opts(list_id, values, false).await
    }

    pub async fn send_choice_update_opts(
        &self,
        list_id: &str,
        values: &[String],
        allow_empty: bool,
    ) -> bool {
        if list_id.is_empty() || (!allow_empty && values.is_empty()) {
            return false;
        }
        let Some(session) = self.live_session() else {
            return false;
        };
        if session.shared().caches.choice_matches(list_id, values) {
            return false;
        }

        let sent = session
            .send(&OutboundMessage::ChoiceUpdate {
                id: EntityId::from_raw(list_id),
                value: values.to_vec(),
                instance_id: None,
            })
            .await;
        if sent {
            session.shared().caches.record_choice(list_id, values.to_vec());
            tracing::debug!(list_id, count = values.len(), "Choice update sent");
        }
        sent
    }

    /// Choice update scoped to one live action instance. Cached separately
    /// from the list-wide values.
    pub async fn send_specific_choice_update(
        &self,
        choice_id: &str,
        instance_id: &str,
        values: &[String],
    ) -> bool {
        self.send_specific_choice_update_opts(choice_id, instance_id, values, false)
            .await
    }

    pub async fn send_specific_choice_update_opts(
        &self,
        choice_id: &str,
        instance_id: &str,
        values: &[String],
        allow_empty: bool,
    ) -> bool {
        if choice_id.is_empty() || instance_id.is_empty() || (!allow_empty && values.is_empty()) {
            return false;
        }
        let Some(session) = self.live_session() else {
            return false;
        };
        let choice_key = format!("{choice_id}:{instance_id}");
        if session.shared().caches.choice_matches(&choice_key, values) {
            return false;
        }

        let sent = session
            .send(&OutboundMessage::ChoiceUpdate {
                id: EntityId::from_raw(choice_id),
                value: values.to_vec(),
                instance_id: Some(InstanceId::from_raw(instance_id)),
            })
            .await;
        if sent {
            session.shared().caches.record_choice(choice_key, values.to_vec());
            tracing::debug!(choice_id, instance_id, "Specific choice update sent");
        }
        sent
    }

    pub async fn send_create_state(
        &self,
        state_id: &str,
        description: &str,
        default_value: &str,
        parent_group: Option<&str>,
    ) -> bool {
        self.send_create_state_opts(state_id, description, default_value, parent_group, false, false)
            .await
    }

    pub async fn send_create_state_opts(
        &self,
        state_id: &str,
        description: &str,
        default_value: &str,
        parent_group: Option<&str>,
        allow_empty: bool,
        force: bool,
    ) -> bool {
        if state_id.is_empty() || description.is_empty() || (!allow_empty && default_value.is_empty())
        {
            return false;
        }
        let Some(session) = self.live_session() else {
            return false;
        };

        // Already created this session: degrade to a plain update.
        if session.shared().caches.state_known(state_id) {
            return self
                .send_state_update_opts(state_id, default_value, allow_empty, force)
                .await;
        }

        let sent = session
            .send(&OutboundMessage::CreateState {
                id: EntityId::from_raw(state_id),
                desc: description.to_owned(),
                default_value: default_value.to_owned(),
                parent_group: parent_group.map(str::to_owned),
            })
            .await;
        if sent {
            session.shared().caches.record_state(state_id, default_value);
            tracing::debug!(state_id, "Create state sent");
        }
        sent
    }

    pub async fn send_remove_state(&self, state_id: &str) -> bool {
        if state_id.is_empty() {
            return false;
        }
        let Some(session) = self.live_session() else {
            return false;
        };

        let sent = session
            .send(&OutboundMessage::RemoveState {
                id: EntityId::from_raw(state_id),
            })
            .await;
        if sent {
            session.shared().caches.forget_state(state_id);
            tracing::debug!(state_id, "Remove state sent");
        }
        sent
    }

    /// Push a connector position back to the host. Prefers the host-issued
    /// short id; falls back to the canonical identity only while it fits the
    /// line allowance.
    pub async fn send_connector_update(
        &self,
        connector_id: &str,
        value: u8,
        data: &[(String, String)],
    ) -> bool {
        if connector_id.is_empty() {
            return false;
        }
        let Some(session) = self.live_session() else {
            return false;
        };

        let value = value.min(100);
        let canonical = construct_identity(
            &self.config.plugin_id,
            &EntityId::from_raw(connector_id),
            value,
            data,
        );
        if session.shared().caches.connector_matches(&canonical, value) {
            return false;
        }

        let message = match session.shared().short_ids.resolve(&canonical) {
            Some(short_id) => OutboundMessage::ConnectorUpdate {
                short_id: Some(short_id),
                connector_id: None,
                value,
            },
            None if canonical.len() <= CANONICAL_ID_MAX_LEN => OutboundMessage::ConnectorUpdate {
                short_id: None,
                connector_id: Some(canonical.clone()),
                value,
            },
            None => {
                // Reference behavior: neither addressing form fits, so the
                // update is dropped rather than queued for retry.
                tracing::warn!(
                    connector_id,
                    id_len = canonical.len(),
                    "Connector update dropped: canonical id over the line allowance and no short id known"
                );
                return false;
            }
        };

        let sent = session.send(&message).await;
        if sent {
            session.shared().caches.record_connector(canonical, value);
            tracing::debug!(connector_id, value, "Connector update sent");
        }
        sent
    }

    /// Push a changed setting value. Valid only when the setting is known
    /// from the last Info/Settings message and the value actually differs.
    pub async fn send_setting_update(&self, name: &str, value: &str, allow_empty: bool) -> bool {
        if name.is_empty() || (!allow_empty && value.is_empty()) {
            return false;
        }
        let Some(session) = self.live_session() else {
            return false;
        };
        if !session.shared().settings.read().would_change(name, value) {
            return false;
        }

        let sent = session
            .send(&OutboundMessage::SettingUpdate {
                name: name.to_owned(),
                value: value.to_owned(),
            })
            .await;
        if sent {
            session.shared().settings.write().record(name, value);
            tracing::debug!(name, "Setting update sent");
        }
        sent
    }

    pub async fn send_show_notification(
        &self,
        notification_id: NotificationId,
        title: &str,
        msg: &str,
        options: Vec<NotificationOption>,
    ) -> bool {
        if title.is_empty() || msg.is_empty() || options.is_empty() {
            return false;
        }
        let Some(session) = self.live_session() else {
            return false;
        };

        let sent = session
            .send(&OutboundMessage::ShowNotification {
                notification_id: notification_id.clone(),
                title: title.to_owned(),
                msg: msg.to_owned(),
                options,
            })
            .await;
        if sent {
            tracing::debug!(notification_id = %notification_id, "Notification sent");
        }
        sent
    }

    /// Patch numeric properties (min/max and friends) of one data field on a
    /// live action instance.
    pub async fn send_action_data_update(
        &self,
        instance_id: &str,
        data_id: &str,
        properties: HashMap<String, f64>,
    ) -> bool {
        if instance_id.is_empty() || data_id.is_empty() || properties.is_empty() {
            return false;
        }
        let Some(session) = self.live_session() else {
            return false;
        };

        session
            .send(&OutboundMessage::UpdateActionData {
                instance_id: InstanceId::from_raw(instance_id),
                data: ActionDataUpdate {
                    id: EntityId::from_raw(data_id),
                    data_type: "number".to_owned(),
                    properties,
                },
            })
            .await
    }

    pub async fn send_trigger_event(
        &self,
        event_id: &str,
        states: Option<HashMap<String, String>>,
    ) -> bool {
        if event_id.is_empty() {
            return false;
        }
        let Some(session) = self.live_session() else {
            return false;
        };

        session
            .send(&OutboundMessage::TriggerEvent {
                event_id: EntityId::from_raw(event_id),
                states,
            })
            .await
    }

    // --- Plugin folder, properties, update check ---

    /// Resolve a path inside the plugin's install folder.
    pub fn resource_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.config.plugin_folder.join(relative)
    }

    /// Load (or reload) a properties file relative to the plugin folder.
    pub fn load_properties(&self, relative: impl AsRef<Path>) -> std::io::Result<()> {
        let store = PropertiesStore::load(self.resource_path(relative))?;
        *self.props.lock() = Some(store);
        Ok(())
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.props.lock().as_ref()?.get(key)
    }

    pub fn property_or(&self, key: &str, default: &str) -> String {
        self.property(key).unwrap_or_else(|| default.to_owned())
    }

    /// Set a property, returning the previous value if any.
    pub fn set_property(&self, key: &str, value: &str) -> Option<String> {
        self.props.lock().as_ref()?.set(key, value)
    }

    pub fn remove_property(&self, key: &str) -> Option<String> {
        self.props.lock().as_ref()?.remove(key)
    }

    /// Persist the loaded properties back to disk.
    pub fn store_properties(&self) -> bool {
        match self.props.lock().as_ref() {
            Some(store) => match store.store() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to store properties");
                    false
                }
            },
            None => false,
        }
    }

    /// Fetch the published version from a remote properties URL and compare
    /// it against the running version.
    pub async fn is_update_available(&self, config_url: &str, current_version: u64) -> bool {
        update::is_update_available(config_url, current_version).await
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{EntityId, InstanceId, NotificationId, PluginId, ShortId};

/// One `{id, value}` pair attached to an action or connector event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPair {
    pub id: String,
    pub value: String,
}

/// Action press, hold-down or hold-up event. All three arrive with the same
/// shape and are told apart by the type tag.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMessage {
    pub plugin_id: PluginId,
    pub action_id: EntityId,
    #[serde(default)]
    pub data: Vec<DataPair>,
}

impl ActionMessage {
    /// Payload of the data pair with the given id, if present.
    pub fn data_value(&self, id: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|pair| pair.id == id)
            .map(|pair| pair.value.as_str())
    }
}

/// Position change of a host-driven continuously-variable control.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorChangeMessage {
    pub plugin_id: PluginId,
    pub connector_id: EntityId,
    pub value: u8,
    #[serde(default)]
    pub data: Vec<DataPair>,
}

impl ConnectorChangeMessage {
    pub fn data_value(&self, id: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|pair| pair.id == id)
            .map(|pair| pair.value.as_str())
    }

    /// Auxiliary data as owned key/value pairs, for identity construction.
    pub fn data_pairs(&self) -> Vec<(String, String)> {
        self.data
            .iter()
            .map(|pair| (pair.id.clone(), pair.value.clone()))
            .collect()
    }
}

/// Sent by the host once after pairing succeeds.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoMessage {
    pub sdk_version: Option<u32>,
    pub host_version_string: Option<String>,
    pub host_version_code: Option<u64>,
    pub plugin_version: Option<u64>,
    #[serde(default)]
    pub settings: Vec<HashMap<String, Value>>,
}

impl InfoMessage {
    pub fn settings_map(&self) -> HashMap<String, String> {
        flatten_settings(&self.settings)
    }
}

/// Sent whenever the user edits the plugin's settings on the host.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsMessage {
    #[serde(default)]
    pub values: Vec<HashMap<String, Value>>,
}

impl SettingsMessage {
    pub fn settings_map(&self) -> HashMap<String, String> {
        flatten_settings(&self.values)
    }
}

/// Settings arrive as an array of single-entry objects; flatten them into one
/// name -> string map.
fn flatten_settings(entries: &[HashMap<String, Value>]) -> HashMap<String, String> {
    let mut settings = HashMap::new();
    for entry in entries {
        for (name, value) in entry {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            settings.insert(name.clone(), text);
        }
    }
    settings
}

/// Host-wide broadcast, e.g. a page change.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage {
    pub event: String,
    pub page_name: Option<String>,
}

/// The user opened a choice list inside an action; the plugin may respond
/// with an instance-specific choice update.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChangeMessage {
    pub plugin_id: PluginId,
    pub action_id: EntityId,
    pub list_id: EntityId,
    pub instance_id: InstanceId,
    pub value: String,
}

/// The user clicked an option on a notification the plugin raised.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationClickedMessage {
    pub notification_id: NotificationId,
    pub option_id: String,
}

/// The host assigned a short alias for a connector's canonical identity.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortConnectorIdNotification {
    pub plugin_id: PluginId,
    /// Full canonical identity as the host serialized it. Data-pair order is
    /// not guaranteed to match what this process would construct.
    pub connector_id: String,
    pub short_id: ShortId,
}

/// Every message the host can send, decoded. Unknown type tags land in
/// `Unrecognized` so newer host protocol versions do not break the read loop.
#[derive(Clone, Debug)]
pub enum InboundMessage {
    Info(InfoMessage),
    Settings(SettingsMessage),
    Broadcast(BroadcastMessage),
    ListChange(ListChangeMessage),
    Action(ActionMessage),
    HoldDown(ActionMessage),
    HoldUp(ActionMessage),
    ConnectorChange(ConnectorChangeMessage),
    NotificationOptionClicked(NotificationClickedMessage),
    ShortConnectorId(ShortConnectorIdNotification),
    ClosePlugin,
    Unrecognized { type_tag: String },
}

impl InboundMessage {
    /// Wire type tag this variant decodes from.
    pub fn type_tag(&self) -> &str {
        match self {
            Self::Info(_) => tags::INFO,
            Self::Settings(_) => tags::SETTINGS,
            Self::Broadcast(_) => tags::BROADCAST,
            Self::ListChange(_) => tags::LIST_CHANGE,
            Self::Action(_) => tags::ACTION,
            Self::HoldDown(_) => tags::HOLD_DOWN,
            Self::HoldUp(_) => tags::HOLD_UP,
            Self::ConnectorChange(_) => tags::CONNECTOR_CHANGE,
            Self::NotificationOptionClicked(_) => tags::NOTIFICATION_OPTION_CLICKED,
            Self::ShortConnectorId(_) => tags::SHORT_CONNECTOR_ID,
            Self::ClosePlugin => tags::CLOSE_PLUGIN,
            Self::Unrecognized { type_tag } => type_tag,
        }
    }

    /// Plugin id carried by entity-addressed messages, used for filtering.
    pub fn plugin_id(&self) -> Option<&PluginId> {
        match self {
            Self::Action(m) | Self::HoldDown(m) | Self::HoldUp(m) => Some(&m.plugin_id),
            Self::ConnectorChange(m) => Some(&m.plugin_id),
            _ => None,
        }
    }
}

/// Inbound wire type tags.
pub mod tags {
    pub const INFO: &str = "info";
    pub const SETTINGS: &str = "settings";
    pub const BROADCAST: &str = "broadcast";
    pub const LIST_CHANGE: &str = "listChange";
    pub const ACTION: &str = "action";
    pub const HOLD_DOWN: &str = "down";
    pub const HOLD_UP: &str = "up";
    pub const CONNECTOR_CHANGE: &str = "connectorChange";
    pub const NOTIFICATION_OPTION_CLICKED: &str = "notificationOptionClicked";
    pub const SHORT_CONNECTOR_ID: &str = "shortConnectorIdNotification";
    pub const CLOSE_PLUGIN: &str = "closePlugin";
}

/// One selectable option attached to a notification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationOption {
    pub id: String,
    pub title: String,
}

/// Numeric-property patch for one data field of a live action instance.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDataUpdate {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(flatten)]
    pub properties: HashMap<String, f64>,
}

/// Every message the plugin can send, serialized as one JSON line.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "pair")]
    Pair { id: PluginId },

    #[serde(rename = "stateUpdate")]
    StateUpdate { id: EntityId, value: String },

    #[serde(rename = "choiceUpdate", rename_all = "camelCase")]
    ChoiceUpdate {
        id: EntityId,
        value: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        instance_id: Option<InstanceId>,
    },

    #[serde(rename = "createState", rename_all = "camelCase")]
    CreateState {
        id: EntityId,
        desc: String,
        default_value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_group: Option<String>,
    },

    #[serde(rename = "removeState")]
    RemoveState { id: EntityId },

    /// Exactly one of `short_id` / `connector_id` is set; the sender decides
    /// which form fits.
    #[serde(rename = "connectorUpdate", rename_all = "camelCase")]
    ConnectorUpdate {
        #[serde(skip_serializing_if = "Option::is_none")]
        short_id: Option<ShortId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        connector_id: Option<String>,
        value: u8,
    },

    #[serde(rename = "settingUpdate")]
    SettingUpdate { name: String, value: String },

    #[serde(rename = "showNotification", rename_all = "camelCase")]
    ShowNotification {
        notification_id: NotificationId,
        title: String,
        msg: String,
        options: Vec<NotificationOption>,
    },

    #[serde(rename = "updateActionData", rename_all = "camelCase")]
    UpdateActionData {
        instance_id: InstanceId,
        data: ActionDataUpdate,
    },

    #[serde(rename = "triggerEvent", rename_all = "camelCase")]
    TriggerEvent {
        event_id: EntityId,
        #[serde(skip_serializing_if = "Option::is_none")]
        states: Option<HashMap<String, String>>,
    },
}

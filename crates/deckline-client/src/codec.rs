use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use deckline_core::messages::{tags, InboundMessage, OutboundMessage};
use deckline_core::DecodeError;

/// A decoded inbound line: the original JSON envelope plus the classified
/// message. The envelope survives because handlers may bind it verbatim and
/// unmatched messages are forwarded raw.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub raw: Value,
    pub message: InboundMessage,
}

type Decoder = Box<dyn Fn(Value) -> Result<InboundMessage, DecodeError> + Send + Sync>;

/// Maps a wire type tag to the concrete message shape it decodes into.
/// Unknown tags classify as `Unrecognized` rather than failing, so newer
/// host protocol versions pass through harmlessly.
pub struct MessageRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl MessageRegistry {
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    pub fn register(&mut self, tag: &'static str, decoder: Decoder) {
        self.decoders.insert(tag, decoder);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Decode one wire line into an envelope.
    pub fn decode_line(&self, line: &str) -> Result<Envelope, DecodeError> {
        let raw: Value = serde_json::from_str(line)?;
        let tag = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?;

        let message = match self.decoders.get(tag) {
            Some(decoder) => decoder(raw.clone())?,
            None => InboundMessage::Unrecognized {
                type_tag: tag.to_string(),
            },
        };

        Ok(Envelope { raw, message })
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(tags::INFO, shape(tags::INFO, InboundMessage::Info));
        registry.register(tags::SETTINGS, shape(tags::SETTINGS, InboundMessage::Settings));
        registry.register(tags::BROADCAST, shape(tags::BROADCAST, InboundMessage::Broadcast));
        registry.register(
            tags::LIST_CHANGE,
            shape(tags::LIST_CHANGE, InboundMessage::ListChange),
        );
        registry.register(tags::ACTION, shape(tags::ACTION, InboundMessage::Action));
        registry.register(tags::HOLD_DOWN, shape(tags::HOLD_DOWN, InboundMessage::HoldDown));
        registry.register(tags::HOLD_UP, shape(tags::HOLD_UP, InboundMessage::HoldUp));
        registry.register(
            tags::CONNECTOR_CHANGE,
            shape(tags::CONNECTOR_CHANGE, InboundMessage::ConnectorChange),
        );
        registry.register(
            tags::NOTIFICATION_OPTION_CLICKED,
            shape(
                tags::NOTIFICATION_OPTION_CLICKED,
                InboundMessage::NotificationOptionClicked,
            ),
        );
        registry.register(
            tags::SHORT_CONNECTOR_ID,
            shape(tags::SHORT_CONNECTOR_ID, InboundMessage::ShortConnectorId),
        );
        registry.register(
            tags::CLOSE_PLUGIN,
            Box::new(|_| Ok(InboundMessage::ClosePlugin)),
        );
        registry
    }
}

/// Decoder for a serde-shaped message wrapped into its enum variant.
fn shape<T: DeserializeOwned + 'static>(
    tag: &'static str,
    wrap: fn(T) -> InboundMessage,
) -> Decoder {
    Box::new(move |value| {
        serde_json::from_value::<T>(value)
            .map(wrap)
            .map_err(|source| DecodeError::Shape {
                tag: tag.to_string(),
                source,
            })
    })
}

/// Encode an outbound message as a single JSON line (newline not included).
pub fn encode_line(message: &OutboundMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckline_core::{EntityId, PluginId};

    #[test]
    fn default_registry_knows_every_tag() {
        let registry = MessageRegistry::default();
        for tag in [
            tags::INFO,
            tags::SETTINGS,
            tags::BROADCAST,
            tags::LIST_CHANGE,
            tags::ACTION,
            tags::HOLD_DOWN,
            tags::HOLD_UP,
            tags::CONNECTOR_CHANGE,
            tags::NOTIFICATION_OPTION_CLICKED,
            tags::SHORT_CONNECTOR_ID,
            tags::CLOSE_PLUGIN,
        ] {
            assert!(registry.contains(tag), "missing decoder for {tag}");
        }
    }

    #[test]
    fn decodes_action_line() {
        let registry = MessageRegistry::default();
        let line = r#"{"type":"action","pluginId":"p","actionId":"p.action.go","data":[]}"#;
        let envelope = registry.decode_line(line).unwrap();
        match envelope.message {
            InboundMessage::Action(msg) => assert_eq!(msg.action_id.as_str(), "p.action.go"),
            other => panic!("unexpected variant: {other:?}"),
        }
        assert_eq!(envelope.raw["pluginId"], "p");
    }

    #[test]
    fn hold_tags_share_the_action_shape() {
        let registry = MessageRegistry::default();
        let down = registry
            .decode_line(r#"{"type":"down","pluginId":"p","actionId":"a"}"#)
            .unwrap();
        assert!(matches!(down.message, InboundMessage::HoldDown(_)));
        let up = registry
            .decode_line(r#"{"type":"up","pluginId":"p","actionId":"a"}"#)
            .unwrap();
        assert!(matches!(up.message, InboundMessage::HoldUp(_)));
    }

    #[test]
    fn unknown_tag_classifies_as_unrecognized() {
        let registry = MessageRegistry::default();
        let envelope = registry
            .decode_line(r#"{"type":"somethingNew","x":1}"#)
            .unwrap();
        assert!(matches!(
            envelope.message,
            InboundMessage::Unrecognized { ref type_tag } if type_tag == "somethingNew"
        ));
    }

    #[test]
    fn missing_type_is_an_error() {
        let registry = MessageRegistry::default();
        let err = registry.decode_line(r#"{"value":1}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingType));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let registry = MessageRegistry::default();
        assert!(matches!(
            registry.decode_line("not json"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn malformed_known_shape_reports_the_tag() {
        let registry = MessageRegistry::default();
        // connectorChange requires a numeric value
        let err = registry
            .decode_line(r#"{"type":"connectorChange","pluginId":"p","connectorId":"c","value":"high"}"#)
            .unwrap_err();
        match err {
            DecodeError::Shape { tag, .. } => assert_eq!(tag, "connectorChange"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn close_plugin_decodes_without_payload() {
        let registry = MessageRegistry::default();
        let envelope = registry
            .decode_line(r#"{"type":"closePlugin","pluginId":"p"}"#)
            .unwrap();
        assert!(matches!(envelope.message, InboundMessage::ClosePlugin));
    }

    #[test]
    fn encode_produces_single_line() {
        let line = encode_line(&OutboundMessage::StateUpdate {
            id: EntityId::from_raw("s"),
            value: "on".into(),
        })
        .unwrap();
        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["type"], "stateUpdate");
    }

    #[test]
    fn encode_pair_matches_wire_contract() {
        let line = encode_line(&OutboundMessage::Pair {
            id: PluginId::from_raw("com.example.demo"),
        })
        .unwrap();
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["type"], "pair");
        assert_eq!(parsed["id"], "com.example.demo");
    }
}

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::ids::{EntityId, PluginId};
use crate::messages::InboundMessage;
use crate::values::{TypedValue, ValueKind};

/// Which message family a handler is registered against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    /// Action, hold-down and hold-up events.
    Action,
    /// Connector position changes.
    Connector,
}

/// How one handler parameter is bound from an inbound message.
#[derive(Clone, Debug)]
pub enum ParamSpec {
    /// Typed payload pulled from the event's data list by id.
    Data { id: String, kind: ValueKind },
    /// The decoded message struct.
    Message,
    /// The original undecoded JSON envelope.
    Envelope,
    /// The connector's 0-100 position. Connector handlers only.
    ConnectorValue,
}

/// Immutable description of one handler: the entity id it answers to and the
/// ordered parameter specs the dispatcher resolves before invoking it.
#[derive(Clone, Debug)]
pub struct HandlerDescriptor {
    pub entity_id: EntityId,
    pub kind: HandlerKind,
    pub params: Vec<ParamSpec>,
}

impl HandlerDescriptor {
    pub fn action(entity_id: impl Into<EntityId>) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind: HandlerKind::Action,
            params: Vec::new(),
        }
    }

    pub fn connector(entity_id: impl Into<EntityId>) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind: HandlerKind::Connector,
            params: Vec::new(),
        }
    }

    pub fn data(mut self, id: impl Into<String>, kind: ValueKind) -> Self {
        self.params.push(ParamSpec::Data { id: id.into(), kind });
        self
    }

    pub fn message(mut self) -> Self {
        self.params.push(ParamSpec::Message);
        self
    }

    pub fn envelope(mut self) -> Self {
        self.params.push(ParamSpec::Envelope);
        self
    }

    pub fn connector_value(mut self) -> Self {
        self.params.push(ParamSpec::ConnectorValue);
        self
    }
}

/// One resolved parameter, in the order declared by the descriptor.
#[derive(Clone, Debug)]
pub enum ResolvedParam {
    Value(TypedValue),
    Message(InboundMessage),
    Envelope(Value),
    ConnectorValue(u8),
}

/// Fully-bound arguments for one handler invocation.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub entity_id: EntityId,
    pub params: Vec<ResolvedParam>,
}

impl Invocation {
    /// Typed value at the given parameter position.
    pub fn value(&self, index: usize) -> Option<&TypedValue> {
        match self.params.get(index) {
            Some(ResolvedParam::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// The connector position, wherever it was declared.
    pub fn connector_value(&self) -> Option<u8> {
        self.params.iter().find_map(|p| match p {
            ResolvedParam::ConnectorValue(v) => Some(*v),
            _ => None,
        })
    }
}

/// Context available to handlers during execution.
#[derive(Clone, Debug)]
pub struct InvocationContext {
    pub plugin_id: PluginId,
    /// Cancelled when the session closes. Long-running handlers should
    /// observe it; the pool will not wait for them.
    pub abort: CancellationToken,
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),
    #[error("cancelled")]
    Cancelled,
}

/// Trait implemented by each registered handler.
#[async_trait]
pub trait Handler: Send + Sync {
    fn descriptor(&self) -> &HandlerDescriptor;

    async fn invoke(
        &self,
        invocation: Invocation,
        ctx: &InvocationContext,
    ) -> Result<(), HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_builder_keeps_param_order() {
        let desc = HandlerDescriptor::connector("p.connector.volume")
            .connector_value()
            .data("channel", ValueKind::Text)
            .envelope();

        assert_eq!(desc.kind, HandlerKind::Connector);
        assert_eq!(desc.params.len(), 3);
        assert!(matches!(desc.params[0], ParamSpec::ConnectorValue));
        assert!(matches!(
            desc.params[1],
            ParamSpec::Data { ref id, kind: ValueKind::Text } if id == "channel"
        ));
        assert!(matches!(desc.params[2], ParamSpec::Envelope));
    }

    #[test]
    fn invocation_value_accessor() {
        let invocation = Invocation {
            entity_id: EntityId::from_raw("a"),
            params: vec![
                ResolvedParam::ConnectorValue(37),
                ResolvedParam::Value(TypedValue::Text("hi".into())),
            ],
        };
        assert_eq!(invocation.connector_value(), Some(37));
        assert_eq!(invocation.value(1).and_then(TypedValue::as_str), Some("hi"));
        assert!(invocation.value(0).is_none());
    }
}

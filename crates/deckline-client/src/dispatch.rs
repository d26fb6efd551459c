use std::sync::Arc;

use deckline_core::messages::{ActionMessage, ConnectorChangeMessage};
use deckline_core::values::coerce;
use deckline_core::{CoerceError, Handler, Invocation, ParamSpec, ResolvedParam};

use crate::caches::OutboundCaches;
use crate::codec::Envelope;
use crate::connector::construct_identity;
use crate::held::{HeldActionTracker, HeldState};
use crate::pool::{InvocationPool, Job};
use crate::registry::HandlerRegistry;

/// Result of routing one entity message through the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler matched and the invocation was handed to the pool.
    Invoked,
    /// No registered handler matched; the caller forwards the raw envelope.
    NoMatch,
}

/// A parameter that could not be bound. Expected and frequent — reported as
/// a value, logged by the read loop, never invoking the handler.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no data pair with id {id:?}")]
    MissingData { id: String },

    #[error("data pair {id:?}: {source}")]
    Coerce {
        id: String,
        #[source]
        source: CoerceError,
    },

    #[error("connector-value binding on an action handler")]
    ConnectorValueOnAction,
}

/// Resolves inbound entity messages against the handler registry and feeds
/// the invocation pool. All bookkeeping (hold state, connector cache) runs
/// synchronously on the read loop before the invocation is queued, so it is
/// consistent by the time any handler observes it.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    held: Arc<HeldActionTracker>,
    caches: Arc<OutboundCaches>,
    pool: InvocationPool,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        held: Arc<HeldActionTracker>,
        caches: Arc<OutboundCaches>,
        pool: InvocationPool,
    ) -> Self {
        Self {
            registry,
            held,
            caches,
            pool,
        }
    }

    pub fn pool(&self) -> &InvocationPool {
        &self.pool
    }

    /// Dispatch an action-family message (press, hold-down or hold-up).
    pub fn dispatch_action(
        &self,
        envelope: &Envelope,
        message: &ActionMessage,
        held: Option<HeldState>,
    ) -> Result<DispatchOutcome, ResolveError> {
        let Some(handler) = self.registry.get_action(message.action_id.as_str()) else {
            return Ok(DispatchOutcome::NoMatch);
        };

        let params = resolve_action_params(&handler, envelope, message)?;

        if let Some(state) = held {
            self.held.set(message.action_id.clone(), state);
        }

        let clear_held = match held {
            Some(HeldState::HeldUp) => Some(message.action_id.clone()),
            _ => None,
        };

        let submitted = self.pool.submit(Job {
            handler,
            invocation: Invocation {
                entity_id: message.action_id.clone(),
                params,
            },
            clear_held: clear_held.clone(),
        });
        // A dropped release would otherwise pin the entry forever.
        if !submitted {
            if let Some(id) = clear_held {
                self.held.clear(&id);
            }
        }

        Ok(DispatchOutcome::Invoked)
    }

    /// Dispatch a connector position change.
    pub fn dispatch_connector(
        &self,
        envelope: &Envelope,
        message: &ConnectorChangeMessage,
    ) -> Result<DispatchOutcome, ResolveError> {
        let Some(handler) = self.registry.get_connector(message.connector_id.as_str()) else {
            return Ok(DispatchOutcome::NoMatch);
        };

        let params = resolve_connector_params(&handler, envelope, message)?;

        // The host just told us where this connector sits; remember it so an
        // outbound update echoing the same value is suppressed.
        let canonical = construct_identity(
            &message.plugin_id,
            &message.connector_id,
            message.value,
            &message.data_pairs(),
        );
        self.caches.record_connector(canonical, message.value);

        self.pool.submit(Job {
            handler,
            invocation: Invocation {
                entity_id: message.connector_id.clone(),
                params,
            },
            clear_held: None,
        });

        Ok(DispatchOutcome::Invoked)
    }
}

fn resolve_action_params(
    handler: &Arc<dyn Handler>,
    envelope: &Envelope,
    message: &ActionMessage,
) -> Result<Vec<ResolvedParam>, ResolveError> {
    handler
        .descriptor()
        .params
        .iter()
        .map(|spec| match spec {
            ParamSpec::Data { id, kind } => {
                let raw = message
                    .data_value(id)
                    .ok_or_else(|| ResolveError::MissingData { id: id.clone() })?;
                coerce(*kind, raw)
                    .map(ResolvedParam::Value)
                    .map_err(|source| ResolveError::Coerce {
                        id: id.clone(),
                        source,
                    })
            }
            ParamSpec::Message => Ok(ResolvedParam::Message(envelope.message.clone())),
            ParamSpec::Envelope => Ok(ResolvedParam::Envelope(envelope.raw.clone())),
            ParamSpec::ConnectorValue => Err(ResolveError::ConnectorValueOnAction),
        })
        .collect()
}

fn resolve_connector_params(
    handler: &Arc<dyn Handler>,
    envelope: &Envelope,
    message: &ConnectorChangeMessage,
) -> Result<Vec<ResolvedParam>, ResolveError> {
    handler
        .descriptor()
        .params
        .iter()
        .map(|spec| match spec {
            ParamSpec::Data { id, kind } => {
                let raw = message
                    .data_value(id)
                    .ok_or_else(|| ResolveError::MissingData { id: id.clone() })?;
                coerce(*kind, raw)
                    .map(ResolvedParam::Value)
                    .map_err(|source| ResolveError::Coerce {
                        id: id.clone(),
                        source,
                    })
            }
            ParamSpec::Message => Ok(ResolvedParam::Message(envelope.message.clone())),
            ParamSpec::Envelope => Ok(ResolvedParam::Envelope(envelope.raw.clone())),
            ParamSpec::ConnectorValue => Ok(ResolvedParam::ConnectorValue(message.value)),
        })
        .collect()
}

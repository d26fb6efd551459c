pub mod errors;
pub mod events;
pub mod handler;
pub mod ids;
pub mod messages;
pub mod settings;
pub mod values;

pub use errors::{ConnectionError, DecodeError};
pub use events::DeckEvent;
pub use handler::{
    Handler, HandlerDescriptor, HandlerError, HandlerKind, Invocation, InvocationContext,
    ParamSpec, ResolvedParam,
};
pub use ids::{EntityId, InstanceId, NotificationId, PluginId, ShortId};
pub use messages::{InboundMessage, OutboundMessage};
pub use settings::SettingsSnapshot;
pub use values::{coerce, CoerceError, TypedValue, ValueKind};

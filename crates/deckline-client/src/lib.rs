pub mod caches;
pub mod client;
pub mod codec;
pub mod config;
pub mod connector;
pub mod dispatch;
pub mod held;
pub mod pool;
pub mod props;
pub mod registry;
pub mod session;
pub mod update;

pub use caches::OutboundCaches;
pub use client::DeckClient;
pub use codec::{encode_line, Envelope, MessageRegistry};
pub use config::ClientConfig;
pub use connector::{construct_identity, deconstruct_identity, ShortIdMap, CANONICAL_ID_MAX_LEN};
pub use dispatch::{DispatchOutcome, Dispatcher, ResolveError};
pub use held::{HeldActionTracker, HeldState};
pub use props::PropertiesStore;
pub use registry::HandlerRegistry;
pub use session::Session;

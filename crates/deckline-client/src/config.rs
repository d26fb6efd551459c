use std::path::PathBuf;

use deckline_core::PluginId;

/// Client configuration. The host endpoint defaults to the reference
/// deployment's loopback socket.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub plugin_id: PluginId,
    /// Number of invocation workers. 1 executes handlers serially; larger
    /// values allow that many handlers to run in parallel.
    pub parallel_invocations: usize,
    /// Capacity of the invocation queue between the read loop and the
    /// workers. Dispatches beyond it are dropped with a warning.
    pub invocation_queue: usize,
    /// Capacity of the event channel handed to the embedding application.
    pub event_queue: usize,
    /// Folder the plugin was installed into; resolves resource and
    /// properties paths.
    pub plugin_folder: PathBuf,
}

impl ClientConfig {
    pub fn new(plugin_id: impl Into<PluginId>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 12136,
            plugin_id: plugin_id.into(),
            parallel_invocations: 1,
            invocation_queue: 256,
            event_queue: 256,
            plugin_folder: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Enable parallel handler execution with the given worker count.
    pub fn parallel(mut self, workers: usize) -> Self {
        self.parallel_invocations = workers.max(1);
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

use tokio::sync::broadcast;

use crate::model::record::PluginId;
use crate::plugin::discovery::PluginState;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    Loaded(PluginId),
    Unloaded(PluginId),
    StatusChanged { plugin_id: PluginId, state: PluginState },
    Error { plugin_id: PluginId, message: String },
}

impl PluginEvent {
    pub fn plugin_id(&self) -> &PluginId {
        match self {
            Self::Loaded(plugin_id) | Self::Unloaded(plugin_id) => plugin_id,
            Self::StatusChanged { plugin_id, .. } | Self::Error { plugin_id, .. } => plugin_id,
        }
    }
}

/// Fan-out of lifecycle events. Emitting with nobody listening is fine;
/// slow subscribers see `Lagged` rather than blocking emitters.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PluginEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: PluginEvent) {
        tracing::trace!(?event, "plugin event");
        // Err only means there are no receivers right now.
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

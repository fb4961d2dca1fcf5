use std::sync::Arc;
use tokio::sync::watch;

/// Online/offline signal. The host may set it; the engine also marks the
/// device offline when the backend is unreachable and online again once a
/// poll tick gets through.
#[derive(Debug, Clone)]
pub struct Connectivity {
    sender: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.sender.send_replace(online);
        if previous != online {
            tracing::info!(online, "Connectivity changed");
        }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

//! Audio route observer for desktop hosts.

use async_trait::async_trait;
use bridge_traits::{
    audio_route::{AudioRouteChangeStream, AudioRouteEvent, AudioRouteObserver},
    error::Result,
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const ROUTE_EVENT_BUFFER: usize = 16;

/// Route observer fed by the embedding application.
///
/// Desktop platforms expose no portable "becoming noisy" signal, so the host
/// application forwards route changes it detects through
/// [`notify`](Self::notify).
pub struct DesktopAudioRouteObserver {
    sender: broadcast::Sender<AudioRouteEvent>,
}

impl DesktopAudioRouteObserver {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(ROUTE_EVENT_BUFFER);
        Self { sender }
    }

    /// Publish a route change to every subscriber.
    pub fn notify(&self, event: AudioRouteEvent) {
        debug!(?event, "Audio route changed");
        // No subscribers is fine: nobody is watching the route yet.
        let _ = self.sender.send(event);
    }

    pub fn notify_becoming_noisy(&self) {
        self.notify(AudioRouteEvent::BecomingNoisy);
    }

    /// Number of live change streams.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DesktopAudioRouteObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioRouteObserver for DesktopAudioRouteObserver {
    async fn subscribe_changes(&self) -> Result<Box<dyn AudioRouteChangeStream>> {
        Ok(Box::new(DesktopAudioRouteStream {
            receiver: self.sender.subscribe(),
        }))
    }
}

struct DesktopAudioRouteStream {
    receiver: broadcast::Receiver<AudioRouteEvent>,
}

#[async_trait]
impl AudioRouteChangeStream for DesktopAudioRouteStream {
    async fn next(&mut self) -> Option<AudioRouteEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Audio route stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

//! Audio Route Changes
//!
//! Notifies the core when the audio output route changes, most importantly
//! when output is about to move to the device speaker ("becoming noisy").

use crate::error::Result;

/// Audio route transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioRouteEvent {
    /// Headphones or another private output were disconnected.
    BecomingNoisy,
    /// A new output device became available.
    OutputConnected(String),
}

/// Audio route observer trait
///
/// # Platform Support
///
/// - **Android**: `ACTION_AUDIO_BECOMING_NOISY` broadcast
/// - **iOS**: `AVAudioSession.routeChangeNotification`
/// - **Desktop**: injected manually (see `bridge-desktop`)
///
/// # Example
///
/// ```ignore
/// use bridge_traits::audio_route::{AudioRouteEvent, AudioRouteObserver};
///
/// async fn watch(observer: &dyn AudioRouteObserver) -> Result<()> {
///     let mut stream = observer.subscribe_changes().await?;
///     while let Some(event) = stream.next().await {
///         if event == AudioRouteEvent::BecomingNoisy {
///             pause_playback();
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait AudioRouteObserver: Send + Sync {
    /// Subscribe to route changes
    async fn subscribe_changes(&self) -> Result<Box<dyn AudioRouteChangeStream>>;
}

/// Stream of audio route changes
#[async_trait::async_trait]
pub trait AudioRouteChangeStream: Send {
    /// Get the next route change
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<AudioRouteEvent>;
}

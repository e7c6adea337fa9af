//! Progressively filled frame store shared between loader and consumers

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures_channel::mpsc;
use imgseq_utils::{LoopCount, Raster};

use crate::{Cancellable, Error};

/// Loading state of an [`ImageCache`]
///
/// States only advance in the order listed, except that every state that
/// is not [`Status::Loaded`] can become [`Status::Invalid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Empty,
    InfoReady,
    FramesReady,
    Loaded,
    Invalid,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Loaded | Self::Invalid)
    }
}

/// Notifications about progress of an [`ImageCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    InfoLoaded,
    FrameLoaded(u32),
    Loaded,
    Failed,
}

/// Sequence metadata as published to consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    pub width: u32,
    pub height: u32,
    /// Number of frames, a lower bound until the cache is loaded
    pub frame_count: u32,
    pub animated: bool,
    pub loop_count: LoopCount,
    pub format_name: String,
}

/// Composited frame ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    raster: Raster,
    delay_ms: u32,
}

impl Frame {
    pub fn new(raster: Raster, delay_ms: u32) -> Self {
        Self { raster, delay_ms }
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn into_raster(self) -> Raster {
        self.raster
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    /// Display duration, `None` for frames without timing
    pub fn delay(&self) -> Option<Duration> {
        (self.delay_ms > 0).then(|| Duration::from_millis(u64::from(self.delay_ms)))
    }
}

#[derive(Debug, Default)]
struct State {
    status: Status,
    info: Option<CacheInfo>,
    frames: Vec<Arc<Frame>>,
    memory_estimate: u64,
    diagnostics: Vec<String>,
    history: Vec<CacheEvent>,
    subscribers: Vec<mpsc::UnboundedSender<CacheEvent>>,
    closed: bool,
}

impl State {
    fn publish(&mut self, event: CacheEvent) {
        self.history.push(event);
        self.subscribers
            .retain(|subscriber| subscriber.unbounded_send(event).is_ok());

        if matches!(event, CacheEvent::Loaded | CacheEvent::Failed) {
            self.subscribers.clear();
        }
    }

    fn check_status(&self, allowed: &[Status], operation: &'static str) -> Result<(), Error> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                status: self.status,
                operation,
            })
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: RwLock<State>,
    cancellable: Option<Cancellable>,
}

/// Frames and status of one image
///
/// Cheap to clone, all clones share the same state. The loader side drives
/// the state transitions, consumers read frames and listen to events.
#[derive(Debug, Clone, Default)]
pub struct ImageCache {
    inner: Arc<Inner>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that ignores all changes once `cancellable` is canceled
    pub fn with_cancellable(cancellable: Cancellable) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::default(),
                cancellable: Some(cancellable),
            }),
        }
    }

    /// Fully loaded cache with a single still frame
    pub fn preloaded(raster: Raster) -> Self {
        let cache = Self::new();
        {
            let mut state = cache.write();
            let (width, height) = raster.dimensions();
            state.info = Some(CacheInfo {
                width,
                height,
                frame_count: 1,
                animated: false,
                loop_count: LoopCount::Infinite,
                format_name: String::new(),
            });
            state.memory_estimate = raster.n_bytes().unwrap_or(u64::MAX);
            state.frames.push(Arc::new(Frame::new(raster, 0)));
            state.status = Status::Loaded;
            state.history = vec![
                CacheEvent::InfoLoaded,
                CacheEvent::FrameLoaded(0),
                CacheEvent::Loaded,
            ];
        }
        cache
    }

    pub fn status(&self) -> Status {
        self.read().status
    }

    pub fn info(&self) -> Option<CacheInfo> {
        self.read().info.clone()
    }

    /// Declared number of frames, `0` before the info is known
    pub fn frame_count(&self) -> u32 {
        self.read()
            .info
            .as_ref()
            .map(|info| info.frame_count)
            .unwrap_or_default()
    }

    /// Number of frames that can be displayed already
    pub fn frames_ready(&self) -> usize {
        self.read().frames.len()
    }

    pub fn frame(&self, index: usize) -> Option<Arc<Frame>> {
        self.read().frames.get(index).cloned()
    }

    pub fn frames(&self) -> Vec<Arc<Frame>> {
        self.read().frames.clone()
    }

    /// Approximate number of bytes used by all frames
    pub fn memory_estimate(&self) -> u64 {
        self.read().memory_estimate
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.read().diagnostics.clone()
    }

    pub fn is_canceled(&self) -> bool {
        self.inner
            .cancellable
            .as_ref()
            .is_some_and(Cancellable::is_canceled)
    }

    /// Stream of cache events
    ///
    /// Events that already happened are replayed first. The stream ends after
    /// [`CacheEvent::Loaded`] or [`CacheEvent::Failed`], or once the cache
    /// is closed.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CacheEvent> {
        let (sender, receiver) = mpsc::unbounded();
        let mut state = self.write();

        for event in &state.history {
            // Receiver is still in scope
            let _ = sender.unbounded_send(*event);
        }

        if !state.closed && !state.status.is_terminal() {
            state.subscribers.push(sender);
        }

        receiver
    }

    /// Ends all event streams without changing the status
    pub fn close(&self) {
        let mut state = self.write();
        state.closed = true;
        state.subscribers.clear();
    }

    pub fn add_diagnostic(&self, message: impl ToString) {
        let message = message.to_string();
        tracing::debug!("Diagnostic: {message}");
        self.write().diagnostics.push(message);
    }

    /// Publishes the sequence info
    pub fn set_info(&self, info: CacheInfo) -> Result<(), Error> {
        let mut state = self.write_uncanceled()?;
        state.check_status(&[Status::Empty], "set info")?;

        tracing::debug!(
            "Info loaded: {}x{} with {} frames",
            info.width,
            info.height,
            info.frame_count
        );
        state.info = Some(info);
        state.status = Status::InfoReady;
        state.publish(CacheEvent::InfoLoaded);

        Ok(())
    }

    /// Appends a frame and returns its index
    pub fn add_frame(&self, raster: Raster, delay_ms: u32) -> Result<u32, Error> {
        let mut state = self.write_uncanceled()?;
        state.check_status(&[Status::InfoReady, Status::FramesReady], "add frame")?;

        let index = u32::try_from(state.frames.len()).map_err(|_| Error::ConversionTooLargerError)?;
        let n_bytes = raster.n_bytes().unwrap_or(u64::MAX);

        state.memory_estimate = state.memory_estimate.saturating_add(n_bytes);
        state.frames.push(Arc::new(Frame::new(raster, delay_ms)));
        if let Some(info) = state.info.as_mut() {
            info.frame_count = info.frame_count.max(index.saturating_add(1));
        }
        state.status = Status::FramesReady;
        state.publish(CacheEvent::FrameLoaded(index));

        Ok(index)
    }

    /// Marks loading as complete
    ///
    /// The frame count is corrected to the number of frames actually added.
    pub fn set_fully_loaded(&self) -> Result<(), Error> {
        let mut state = self.write_uncanceled()?;
        state.check_status(&[Status::FramesReady], "finish loading")?;

        let n_frames = u32::try_from(state.frames.len()).unwrap_or(u32::MAX);
        if let Some(info) = state.info.as_mut() {
            if info.frame_count != n_frames {
                tracing::debug!(
                    "Correcting frame count from {} to {n_frames}",
                    info.frame_count
                );
                info.frame_count = n_frames;
            }
        }
        state.status = Status::Loaded;
        state.publish(CacheEvent::Loaded);

        Ok(())
    }

    /// Marks loading as failed, frames that are already loaded are kept
    pub fn mark_invalid(&self, reason: impl ToString) -> Result<(), Error> {
        let mut state = self.write_uncanceled()?;
        state.check_status(
            &[Status::Empty, Status::InfoReady, Status::FramesReady],
            "mark invalid",
        )?;

        let reason = reason.to_string();
        tracing::debug!("Image invalid: {reason}");
        state.diagnostics.push(reason);
        state.status = Status::Invalid;
        state.publish(CacheEvent::Failed);

        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access, checking cancellation while holding the lock
    fn write_uncanceled(&self) -> Result<RwLockWriteGuard<'_, State>, Error> {
        let state = self.write();
        if self.is_canceled() {
            return Err(Error::Canceled);
        }
        Ok(state)
    }
}

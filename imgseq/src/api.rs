use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;

use crate::assembler;
use crate::cache::{CacheInfo, Frame, ImageCache, Status};
use crate::config::Config;
use crate::icc::ColorManager;
use crate::registry::DecoderRegistry;
use crate::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Flag to stop a load that is no longer needed
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellable {
    canceled: Arc<AtomicBool>,
}

impl Cancellable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Image loading builder
#[derive(Debug)]
pub struct Loader {
    source: Source,
    file_name: Option<PathBuf>,
    registry: DecoderRegistry,
    config: Option<Config>,
    color_manager: ColorManager,
    cancellable: Cancellable,
}

impl Loader {
    /// Loader for the file at `path`
    pub fn new(path: impl Into<PathBuf>, registry: DecoderRegistry) -> Self {
        let path = path.into();
        Self {
            file_name: Some(path.clone()),
            source: Source::Path(path),
            registry,
            config: None,
            color_manager: ColorManager::default(),
            cancellable: Cancellable::new(),
        }
    }

    /// Loader for an image that is already in memory
    pub fn for_bytes(data: Vec<u8>, registry: DecoderRegistry) -> Self {
        Self {
            file_name: None,
            source: Source::Bytes(data),
            registry,
            config: None,
            color_manager: ColorManager::default(),
            cancellable: Cancellable::new(),
        }
    }

    /// File name used to guess the format if the data is not recognized
    pub fn file_name(&mut self, file_name: impl AsRef<Path>) -> &mut Self {
        self.file_name = Some(file_name.as_ref().to_path_buf());
        self
    }

    /// Use `config` instead of [`Config::cached`]
    pub fn config(&mut self, config: Config) -> &mut Self {
        self.config = Some(config);
        self
    }

    /// Set the color manager that decides the color transformation
    ///
    /// By default, images with an embedded profile are converted to sRGB.
    pub fn color_manager(&mut self, color_manager: ColorManager) -> &mut Self {
        self.color_manager = color_manager;
        self
    }

    /// Set [`Cancellable`] to stop loading
    pub fn cancellable(&mut self, cancellable: Cancellable) -> &mut Self {
        self.cancellable = cancellable;
        self
    }

    /// Starts loading in a background thread
    ///
    /// Failures are reported through the [`Status`] of the image's cache.
    pub fn load(self) -> Image {
        let cancellable = self.cancellable.clone();
        let cache = ImageCache::with_cancellable(cancellable.clone());

        let worker_cache = cache.clone();
        let spawned = std::thread::Builder::new()
            .name(String::from("imgseq-loader"))
            .spawn(move || worker(self, worker_cache));

        if let Err(err) = spawned {
            tracing::error!("Failed to spawn loader thread: {err}");
            let _result = cache.mark_invalid(Error::io(err, "spawning loader thread"));
            cache.close();
        }

        Image { cache, cancellable }
    }

    fn source_name(&self) -> Option<&Path> {
        match &self.source {
            Source::Path(path) => Some(path),
            Source::Bytes(_) => self.file_name.as_deref(),
        }
    }

    fn read_data(&mut self) -> Result<Vec<u8>> {
        match &mut self.source {
            Source::Path(path) => {
                std::fs::read(path.as_path()).map_err(|err| Error::io(err, path.display()))
            }
            Source::Bytes(data) => Ok(std::mem::take(data)),
        }
    }

    fn run(mut self, cache: &ImageCache) -> Result<()> {
        let data = self.read_data()?;
        let decoder = self.registry.find(&data, self.file_name.as_deref())?;
        let (info, source) = decoder.decode(data)?;

        tracing::debug!(
            "{} image with {} sub-frames, animated: {}",
            info.format_name,
            info.frame_count,
            info.animated
        );

        let transform = match self.color_manager.transform_for(info.iccp.as_deref()) {
            Ok(transform) => transform,
            Err(err) => {
                cache.add_diagnostic(format!("Colors not transformed: {err}"));
                None
            }
        };

        let delay_policy = match &self.config {
            Some(config) => config.delay,
            None => Config::cached().delay,
        };

        assembler::run(info, source, cache, delay_policy, transform)
    }
}

#[tracing::instrument(skip_all, fields(source = ?loader.source_name()))]
fn worker(loader: Loader, cache: ImageCache) {
    match loader.run(&cache) {
        Ok(()) => tracing::debug!("Loaded {} frames", cache.frames_ready()),
        Err(Error::Canceled) => tracing::debug!("Loading canceled"),
        Err(err) => {
            tracing::warn!("Failed to load image: {err}");
            if let Err(err) = cache.mark_invalid(&err) {
                tracing::debug!("Failure not recorded: {err}");
            }
        }
    }

    cache.close();
}

/// Image that is being loaded or is loaded
///
/// Dropping the image cancels loading.
#[derive(Debug)]
pub struct Image {
    cache: ImageCache,
    cancellable: Cancellable,
}

impl Image {
    /// Frames and status shared with the loader
    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn status(&self) -> Status {
        self.cache.status()
    }

    /// [`Cancellable`] to stop loading of this image
    pub fn cancellable(&self) -> Cancellable {
        self.cancellable.clone()
    }

    pub fn cancel(&self) {
        self.cancellable.cancel();
    }

    /// Waits for the image info
    ///
    /// Returns `None` if loading ends before the info is known.
    pub async fn info(&self) -> Option<CacheInfo> {
        let mut events = self.cache.subscribe();
        loop {
            if let Some(info) = self.cache.info() {
                return Some(info);
            }
            if events.next().await.is_none() {
                return self.cache.info();
            }
        }
    }

    /// Waits until the frame with `index` is available
    ///
    /// Returns `None` if loading ends without producing this frame.
    pub async fn frame(&self, index: usize) -> Option<Arc<Frame>> {
        let mut events = self.cache.subscribe();
        loop {
            if let Some(frame) = self.cache.frame(index) {
                return Some(frame);
            }
            if events.next().await.is_none() {
                return self.cache.frame(index);
            }
        }
    }

    /// Waits until loading has ended and returns the final status
    pub async fn finished(&self) -> Status {
        let mut events = self.cache.subscribe();
        while events.next().await.is_some() {}
        self.cache.status()
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        self.cancellable.cancel();
    }
}

/// Holds the image that is currently displayed
///
/// Loading a new image cancels the previous load, so that only one load is
/// active per slot.
#[derive(Debug, Default)]
pub struct ImageSlot {
    current: Option<Image>,
}

impl ImageSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current image with a new load
    pub fn load(&mut self, loader: Loader) -> &Image {
        self.clear();
        self.current.insert(loader.load())
    }

    pub fn current(&self) -> Option<&Image> {
        self.current.as_ref()
    }

    /// Cancels and removes the current image
    pub fn clear(&mut self) {
        if let Some(image) = self.current.take() {
            tracing::debug!("Superseding load in state {:?}", image.status());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_file_is_invalid() {
        let image = Loader::new("/nonexistent/image.gif", DecoderRegistry::new()).load();
        let status = async_global_executor::block_on(image.finished());
        assert_eq!(status, Status::Invalid);
        assert_eq!(image.cache().diagnostics().len(), 1);
    }

    #[test]
    fn unknown_format_is_invalid() {
        let mut loader = Loader::for_bytes(vec![1, 2, 3], DecoderRegistry::new());
        loader.file_name("image.xyz");
        let image = loader.load();

        async_global_executor::block_on(async {
            assert_eq!(image.finished().await, Status::Invalid);
            assert!(image.info().await.is_none());
            assert!(image.frame(0).await.is_none());
        });
    }

    #[test]
    fn slot_cancels_previous_load() {
        let mut slot = ImageSlot::new();
        let first = slot
            .load(Loader::for_bytes(Vec::new(), DecoderRegistry::new()))
            .cancellable();
        slot.load(Loader::for_bytes(Vec::new(), DecoderRegistry::new()));

        assert!(first.is_canceled());
        assert!(!slot.current().unwrap().cancellable().is_canceled());
        slot.clear();
        assert!(slot.current().is_none());
    }

    #[allow(dead_code)]
    fn ensure_futures_are_send() {
        fn is_send<T: Send>(_: T) {}
        let image = Loader::for_bytes(Vec::new(), DecoderRegistry::new()).load();
        is_send(image.frame(0));
        is_send(image.finished());
    }
}

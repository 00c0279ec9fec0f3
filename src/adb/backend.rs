use super::error::AdbResult;
use super::types::{ClickSpec, Point, Region, Surface};
use image::RgbImage;
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

// One physical screen per process: captures and inputs never overlap.
static SCREEN_LOCK: LazyLock<Arc<Mutex<()>>> = LazyLock::new(|| Arc::new(Mutex::new(())));

/// Serializing front for a [`Surface`]. Every clone shares the same lock, and
/// [`ScreenBackend::new`] shares it process-wide.
#[derive(Clone)]
pub struct ScreenBackend {
    surface: Arc<dyn Surface>,
    lock: Arc<Mutex<()>>,
}

impl ScreenBackend {
    pub fn new(surface: Arc<dyn Surface>) -> Self {
        Self {
            surface,
            lock: SCREEN_LOCK.clone(),
        }
    }

    /// Backend with its own lock, for surfaces that never share a device.
    pub fn isolated(surface: Arc<dyn Surface>) -> Self {
        Self {
            surface,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn capture(&self, region: Option<Region>) -> AdbResult<RgbImage> {
        let _guard = self.lock.lock().await;
        self.surface.capture(region).await
    }

    pub async fn click(&self, point: Point, spec: ClickSpec) -> AdbResult<()> {
        let _guard = self.lock.lock().await;
        log::debug!("👆 click {:?} x{} ({:?})", point, spec.clicks, spec.button);
        self.surface.click(point, spec).await
    }

    pub async fn drag(&self, start: Point, end: Point) -> AdbResult<()> {
        let _guard = self.lock.lock().await;
        log::debug!("👉 drag {:?} -> {:?}", start, end);
        self.surface.drag(start, end).await
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    pub fn device_name(&self) -> &str {
        self.surface.name()
    }
}

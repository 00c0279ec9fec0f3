// Tests for the device surface layer
// Focus: adb output parsing, geometry helpers, serialized access

#[cfg(test)]
mod surface_tests {
    use super::super::backend::ScreenBackend;
    use super::super::error::{AdbError, AdbResult};
    use super::super::shell::AdbShell;
    use super::super::types::{ClickSpec, Point, Region, Surface};
    use async_trait::async_trait;
    use image::RgbImage;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // ============================================================
    // ADB OUTPUT PARSING TESTS
    // ============================================================

    #[test]
    fn test_parse_screen_size() {
        let result = AdbShell::parse_screen_size("Physical size: 1080x2400\n");
        assert_eq!(result.ok(), Some((1080, 2400)));
    }

    #[test]
    fn test_parse_screen_size_with_noise() {
        let output = "Override size: 1080x1920\nPhysical size: 1080x2400\n";
        assert_eq!(AdbShell::parse_screen_size(output).ok(), Some((1080, 2400)));
    }

    #[test]
    fn test_parse_screen_size_invalid() {
        for output in ["", "No size info", "Physical size: invalid", "Physical size: 1080"] {
            assert!(
                matches!(
                    AdbShell::parse_screen_size(output),
                    Err(AdbError::ScreenSizeParseFailed)
                ),
                "'{output}' should not parse"
            );
        }
    }

    #[test]
    fn test_parse_devices() {
        let output = "List of devices attached\n\
            emulator-5554          device product:sdk model:Pixel transport_id:3\n\
            192.168.1.20:5555      offline transport_id:4\n\
            R58M123456             device usb:1-1 transport_id:7\n";
        let devices = AdbShell::parse_devices(output);

        assert_eq!(devices.len(), 2, "Offline devices should be skipped");
        assert_eq!(devices[0].name, "emulator-5554");
        assert_eq!(devices[0].transport_id.as_deref(), Some("3"));
        assert_eq!(devices[1].transport_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_disconnect_classification() {
        assert!(AdbError::NoDevice.is_disconnect());
        assert!(
            AdbError::CommandFailed {
                command: "exec-out screencap".into(),
                stderr: "error: device offline".into()
            }
            .is_disconnect()
        );
        assert!(!AdbError::ScreenSizeParseFailed.is_disconnect());
    }

    // ============================================================
    // GEOMETRY TESTS
    // ============================================================

    #[test]
    fn test_region_contains_and_center() {
        let region = Region::new(10, 20, 30, 40);

        assert!(region.contains_point(Point::new(10, 20)));
        assert!(!region.contains_point(Point::new(40, 20)), "Right edge is exclusive");
        assert_eq!(region.center(), Point::new(25, 40));
        assert!(region.fits_within(40, 60));
        assert!(!region.fits_within(39, 60));
    }

    // ============================================================
    // SERIALIZED ACCESS TESTS
    // ============================================================

    /// Surface that records how many operations overlap.
    #[derive(Default)]
    struct OverlapProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl OverlapProbe {
        async fn enter(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Surface for OverlapProbe {
        async fn capture(&self, _region: Option<Region>) -> AdbResult<RgbImage> {
            self.enter().await;
            Ok(RgbImage::new(4, 4))
        }

        async fn click(&self, _point: Point, _spec: ClickSpec) -> AdbResult<()> {
            self.enter().await;
            Ok(())
        }

        async fn drag(&self, _start: Point, _end: Point) -> AdbResult<()> {
            self.enter().await;
            Ok(())
        }

        fn dimensions(&self) -> (u32, u32) {
            (4, 4)
        }

        fn name(&self) -> &str {
            "overlap-probe"
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_backend_never_overlaps_operations() {
        let probe = Arc::new(OverlapProbe::default());
        let backend = ScreenBackend::isolated(probe.clone());

        let mut tasks = Vec::new();
        for i in 0..12 {
            let backend = backend.clone();
            tasks.push(tokio::spawn(async move {
                match i % 3 {
                    0 => backend.capture(None).await.map(|_| ()),
                    1 => backend.click(Point::new(1, 1), ClickSpec::times(1)).await,
                    _ => backend.drag(Point::new(0, 0), Point::new(3, 3)).await,
                }
            }));
        }
        for task in tasks {
            task.await.expect("task panicked").expect("operation failed");
        }

        assert_eq!(
            probe.peak.load(Ordering::SeqCst),
            1,
            "Captures and inputs must be serialized"
        );
    }
}

use super::error::{AdbError, AdbResult};
use super::types::{Button, ClickSpec, Device, Point, Region, Surface};
use async_trait::async_trait;
use image::RgbImage;
use rand::Rng;
use std::time::Duration;
use tokio::process::Command;

const LONG_PRESS_MS: u32 = 600;
const DRAG_MS: u32 = 300;

/// Surface backed by the `adb` command line tool.
pub struct AdbShell {
    pub device: Device,
    pub transport_id: Option<String>,
    pub screen_x: u32,
    pub screen_y: u32,
}

impl AdbShell {
    fn ensure_adb_available() -> AdbResult<()> {
        match std::process::Command::new("adb").arg("version").output() {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(AdbError::CommandFailed {
                command: "version".to_string(),
                stderr: format!("returned non-zero ({})", out.status),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AdbError::AdbNotFound),
            Err(e) => Err(AdbError::from(e)),
        }
    }

    /// Connect to the device with the given transport id, or the first one listed.
    pub async fn new(transport_id: Option<&str>) -> AdbResult<Self> {
        Self::ensure_adb_available()?;
        let devices = Self::list_devices().await?;
        if devices.is_empty() {
            return Err(AdbError::NoDevice);
        }
        let device = match transport_id {
            Some(tid) => devices
                .into_iter()
                .find(|d| d.transport_id.as_deref() == Some(tid))
                .ok_or_else(|| AdbError::DeviceNotFound {
                    name: format!("transport_id:{tid}"),
                })?,
            None => devices.into_iter().next().ok_or(AdbError::NoDevice)?,
        };
        let transport_id = device.transport_id.clone();
        let (screen_x, screen_y) = Self::get_screen_size(transport_id.as_deref()).await?;
        log::info!(
            "📱 Connected to {} ({}x{}, transport {:?})",
            device.name,
            screen_x,
            screen_y,
            transport_id
        );
        Ok(Self {
            device,
            transport_id,
            screen_x,
            screen_y,
        })
    }

    /// Connect by serial, running `adb connect` first for network devices.
    pub async fn new_with_device(device_name: &str) -> AdbResult<Self> {
        let devices = Self::list_devices().await?;
        if let Some(device) = devices.iter().find(|d| d.name == device_name) {
            return Self::new(device.transport_id.as_deref()).await;
        }
        let output = Command::new("adb")
            .arg("connect")
            .arg(device_name)
            .output()
            .await?;
        let stdout_str = String::from_utf8_lossy(&output.stdout);
        let stderr_str = String::from_utf8_lossy(&output.stderr);
        if !output.status.success()
            || stdout_str.contains("Connection refused")
            || stderr_str.contains("Connection refused")
        {
            return Err(AdbError::ConnectFailed {
                name: device_name.to_string(),
                output: format!("{} {}", stdout_str.trim(), stderr_str.trim()),
            });
        }
        let devices = Self::list_devices().await?;
        match devices.iter().find(|d| d.name == device_name) {
            Some(device) => Self::new(device.transport_id.as_deref()).await,
            None => Err(AdbError::DeviceNotFound {
                name: device_name.to_string(),
            }),
        }
    }

    fn command(transport_id: Option<&str>) -> Command {
        let mut cmd = Command::new("adb");
        if let Some(tid) = transport_id {
            cmd.arg("-t").arg(tid);
        }
        cmd
    }

    async fn run(&self, label: &str, args: &[String]) -> AdbResult<Vec<u8>> {
        let output = Self::command(self.transport_id.as_deref())
            .args(args)
            .output()
            .await?;
        if !output.status.success() {
            return Err(AdbError::CommandFailed {
                command: label.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    async fn get_screen_size(transport_id: Option<&str>) -> AdbResult<(u32, u32)> {
        let output = Self::command(transport_id)
            .args(["shell", "wm", "size"])
            .output()
            .await?;
        if !output.status.success() {
            return Err(AdbError::CommandFailed {
                command: "shell wm size".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Self::parse_screen_size(&String::from_utf8_lossy(&output.stdout))
    }

    pub fn parse_screen_size(stdout: &str) -> AdbResult<(u32, u32)> {
        for line in stdout.lines() {
            if let Some(size_str) = line.strip_prefix("Physical size: ") {
                let parts: Vec<&str> = size_str.trim().split('x').collect();
                if parts.len() == 2
                    && let (Ok(x), Ok(y)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>())
                {
                    return Ok((x, y));
                }
            }
        }
        Err(AdbError::ScreenSizeParseFailed)
    }

    pub fn parse_devices(output: &str) -> Vec<Device> {
        output
            .lines()
            .skip(1)
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 2 && parts[1] == "device" {
                    let transport_id = parts
                        .iter()
                        .find_map(|part| part.strip_prefix("transport_id:"))
                        .map(str::to_string);
                    Some(Device {
                        name: parts[0].to_string(),
                        transport_id,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    pub async fn list_devices() -> AdbResult<Vec<Device>> {
        Self::ensure_adb_available()?;
        let output = Command::new("adb").args(["devices", "-l"]).output().await?;
        if !output.status.success() {
            return Err(AdbError::CommandFailed {
                command: "devices".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(Self::parse_devices(&String::from_utf8_lossy(&output.stdout)))
    }

    fn check_bounds(&self, point: Point) -> AdbResult<()> {
        if point.x > self.screen_x || point.y > self.screen_y {
            return Err(AdbError::InputOutOfBounds {
                x: point.x,
                y: point.y,
            });
        }
        Ok(())
    }

    fn jittered(&self, point: Point, jitter: u32) -> Point {
        if jitter == 0 {
            return point;
        }
        let mut rng = rand::thread_rng();
        let offset = jitter as i64;
        let x = (point.x as i64 + rng.gen_range(-offset..=offset)).clamp(0, self.screen_x as i64);
        let y = (point.y as i64 + rng.gen_range(-offset..=offset)).clamp(0, self.screen_y as i64);
        Point::new(x as u32, y as u32)
    }

    async fn swipe(&self, start: Point, end: Point, duration_ms: u32) -> AdbResult<()> {
        self.check_bounds(start)?;
        self.check_bounds(end)?;
        let args: Vec<String> = vec![
            "shell".into(),
            "input".into(),
            "swipe".into(),
            start.x.to_string(),
            start.y.to_string(),
            end.x.to_string(),
            end.y.to_string(),
            duration_ms.to_string(),
        ];
        self.run("shell input swipe", &args).await.map(|_| ())
    }

    async fn tap(&self, point: Point) -> AdbResult<()> {
        self.check_bounds(point)?;
        let args: Vec<String> = vec![
            "shell".into(),
            "input".into(),
            "tap".into(),
            point.x.to_string(),
            point.y.to_string(),
        ];
        self.run("shell input tap", &args).await.map(|_| ())
    }
}

#[async_trait]
impl Surface for AdbShell {
    async fn capture(&self, region: Option<Region>) -> AdbResult<RgbImage> {
        let args: Vec<String> = vec!["exec-out".into(), "screencap".into(), "-p".into()];
        let bytes = self.run("exec-out screencap", &args).await?;
        let frame = image::load_from_memory(&bytes)
            .map_err(|e| AdbError::CaptureDecodeFailed {
                description: e.to_string(),
            })?
            .to_rgb8();
        match region {
            None => Ok(frame),
            Some(r) if r.fits_within(frame.width(), frame.height()) => {
                Ok(image::imageops::crop_imm(&frame, r.x, r.y, r.width, r.height).to_image())
            }
            Some(r) => Err(AdbError::RegionOutOfBounds {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
                screen_width: frame.width(),
                screen_height: frame.height(),
            }),
        }
    }

    async fn click(&self, point: Point, spec: ClickSpec) -> AdbResult<()> {
        for i in 0..spec.clicks {
            let target = self.jittered(point, spec.jitter);
            match spec.button {
                Button::Left => self.tap(target).await?,
                Button::Right => self.swipe(target, target, LONG_PRESS_MS).await?,
            }
            if i + 1 < spec.clicks && !spec.interval.is_zero() {
                tokio::time::sleep(spec.interval).await;
            }
        }
        Ok(())
    }

    async fn drag(&self, start: Point, end: Point) -> AdbResult<()> {
        self.swipe(start, end, DRAG_MS).await?;
        // Let the scroll settle before the next capture.
        tokio::time::sleep(Duration::from_millis(DRAG_MS as u64)).await;
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.screen_x, self.screen_y)
    }

    fn name(&self) -> &str {
        &self.device.name
    }
}

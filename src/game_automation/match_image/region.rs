//! Search region helpers for targeted image matching

use crate::adb::Region;

impl Region {
    /// Parse region from filename format: template-[x,y,width,height].png
    pub fn parse_from_filename(filename: &str) -> Option<Region> {
        let start = filename.find('[')?;
        let end = filename.find(']')?;
        if end <= start {
            return None;
        }
        let parts: Vec<&str> = filename[start + 1..end].split(',').collect();
        if parts.len() == 4
            && let (Ok(x), Ok(y), Ok(width), Ok(height)) = (
                parts[0].trim().parse::<u32>(),
                parts[1].trim().parse::<u32>(),
                parts[2].trim().parse::<u32>(),
                parts[3].trim().parse::<u32>(),
            )
        {
            return Some(Region::new(x, y, width, height));
        }
        None
    }

    /// Clip region to screen boundaries
    pub fn clip_to_screen(mut self, screen_width: u32, screen_height: u32) -> Region {
        self.x = self.x.min(screen_width.saturating_sub(1));
        self.y = self.y.min(screen_height.saturating_sub(1));
        self.width = self.width.min(screen_width.saturating_sub(self.x));
        self.height = self.height.min(screen_height.saturating_sub(self.y));
        self
    }

    /// Grow the region by `margin` on every side, staying on screen.
    pub fn expand(self, margin: u32, screen_width: u32, screen_height: u32) -> Region {
        let x = self.x.saturating_sub(margin);
        let y = self.y.saturating_sub(margin);
        Region::new(
            x,
            y,
            self.width + (self.x - x) + margin,
            self.height + (self.y - y) + margin,
        )
        .clip_to_screen(screen_width, screen_height)
    }

    pub fn scaled(self, factor: f32) -> Region {
        if (factor - 1.0).abs() < f32::EPSILON {
            return self;
        }
        Region::new(
            (self.x as f32 * factor) as u32,
            (self.y as f32 * factor) as u32,
            ((self.width as f32 * factor) as u32).max(1),
            ((self.height as f32 * factor) as u32).max(1),
        )
    }
}

//! Template loading and lookup

use super::error::{MatchError, MatchResult};
use crate::adb::Region;
use image::GrayImage;
use std::collections::HashMap;
use std::path::Path;

/// Library key for a file stem: `exit_panel-[10,20,30,40]` is `exit_panel`.
pub fn template_key(stem: &str) -> &str {
    match stem.find("-[") {
        Some(idx) => &stem[..idx],
        None => stem,
    }
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub image: GrayImage,
    /// Where the template was cut from; searches stay near it.
    pub search_region: Option<Region>,
}

impl Template {
    pub fn new(name: impl Into<String>, image: GrayImage, search_region: Option<Region>) -> Self {
        Self {
            name: name.into(),
            image,
            search_region,
        }
    }

    /// Load a template file. A file named `name-[x,y,w,h].png` holds a full
    /// screenshot; the template is the `[x,y,w,h]` crop of it.
    pub fn load(path: &Path) -> MatchResult<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");
        let full = image::open(path)
            .map_err(|source| MatchError::Load {
                path: path.to_path_buf(),
                source,
            })?
            .to_luma8();

        let region = Region::parse_from_filename(stem);
        let image = match region {
            Some(r) if r.fits_within(full.width(), full.height()) => {
                image::imageops::crop_imm(&full, r.x, r.y, r.width, r.height).to_image()
            }
            Some(r) => {
                return Err(MatchError::CropOutOfBounds {
                    region: format!("[{},{},{},{}]", r.x, r.y, r.width, r.height),
                    width: full.width(),
                    height: full.height(),
                });
            }
            None => full,
        };
        Ok(Self::new(template_key(stem), image, region))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Templates keyed by name, loaded once at start.
#[derive(Debug, Default)]
pub struct TemplateLibrary {
    templates: HashMap<String, Template>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Scan directory for PNG template files and load them. Files that fail to
    /// load are skipped with a warning.
    pub fn load_directory(&mut self, directory: &Path) -> MatchResult<usize> {
        if !directory.exists() {
            return Err(MatchError::DirectoryNotFound {
                path: directory.to_path_buf(),
            });
        }

        let mut loaded = 0;
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            match Template::load(&path) {
                Ok(template) => {
                    log::debug!(
                        "🖼️ Loaded template '{}' {}x{}",
                        template.name,
                        template.width(),
                        template.height()
                    );
                    self.insert(template);
                    loaded += 1;
                }
                Err(e) => log::warn!("⚠️ Skipping template {}: {}", path.display(), e),
            }
        }
        Ok(loaded)
    }
}

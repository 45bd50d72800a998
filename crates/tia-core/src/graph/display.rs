use std::collections::BTreeMap;
use std::fmt;

use tia_common::resolve_name;
use tracing::{info, warn};

use super::image::ImageNode;
use crate::error::{Result, TiaError};
use crate::ports::RemoteRef;
use crate::values::Position2D;

/// A display pane inside a window.
pub struct DisplayNode {
    name: String,
    window: String,
    remote: RemoteRef,
    images: BTreeMap<String, ImageNode>,
    position_markers: BTreeMap<String, Position2D>,
}

impl fmt::Debug for DisplayNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayNode")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("images", &self.images.keys().collect::<Vec<_>>())
            .field("position_markers", &self.position_markers)
            .finish()
    }
}

impl DisplayNode {
    pub fn load(remote: RemoteRef, window: &str, name: &str) -> Result<Self> {
        let mut display = Self {
            name: name.to_string(),
            window: window.to_string(),
            remote,
            images: BTreeMap::new(),
            position_markers: BTreeMap::new(),
        };
        display.refresh()?;
        Ok(display)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> &str {
        &self.window
    }

    pub fn images(&self) -> &BTreeMap<String, ImageNode> {
        &self.images
    }

    pub fn image(&self, name: &str) -> Option<&ImageNode> {
        self.images.get(name)
    }

    pub fn image_mut(&mut self, name: &str) -> Option<&mut ImageNode> {
        self.images.get_mut(name)
    }

    /// Read-only mirror of the display's position markers.
    pub fn position_markers(&self) -> &BTreeMap<String, Position2D> {
        &self.position_markers
    }

    /// Re-enumerates images and position markers, replacing both maps.
    pub fn refresh(&mut self) -> Result<()> {
        let names = self.remote.object_names(&self.window, &self.name)?;
        let mut images = BTreeMap::new();
        for image in &names.images {
            let node = ImageNode::load(self.remote.clone(), &self.window, &self.name, image)?;
            images.insert(image.clone(), node);
        }
        let markers =
            self.remote
                .position_markers(&self.window, &self.name, &names.position_markers)?;
        self.images = images;
        self.position_markers = markers;
        Ok(())
    }

    /// Adds an image bound to the `calibration` workspace variable.
    pub fn add_image(
        &mut self,
        name: &str,
        size_x: u32,
        size_y: u32,
        calibration: &str,
    ) -> Result<&ImageNode> {
        let name = resolve_name(name, self.images.keys());
        self.remote
            .add_image(&self.window, &self.name, &name, size_x, size_y, calibration)?;
        let node = ImageNode::load(self.remote.clone(), &self.window, &self.name, &name)?;
        info!(window = %self.window, display = %self.name, image = %name, "Image added");
        Ok(self.images.entry(name).or_insert(node))
    }

    /// Deleting a missing image logs a warning and succeeds.
    pub fn delete_image(&mut self, name: &str) -> Result<()> {
        if !self.images.contains_key(name) {
            warn!(display = %self.name, image = name, "{}", TiaError::not_found("image", name));
            return Ok(());
        }
        match self.remote.delete_object(&self.window, &self.name, name) {
            Ok(()) => {}
            Err(e) if e.is_remote_not_found() => {
                warn!(display = %self.name, image = name, error = %e, "Image already gone");
            }
            Err(e) => return Err(e),
        }
        self.images.remove(name);
        Ok(())
    }

    pub fn delete_all_images(&mut self) -> Result<()> {
        let names: Vec<String> = self.images.keys().cloned().collect();
        for name in names {
            self.delete_image(&name)?;
        }
        Ok(())
    }

    pub(crate) fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        writeln!(f, "{}{}", "\t".repeat(level), self.name)?;
        for name in self.images.keys() {
            writeln!(f, "{}{}", "\t".repeat(level + 1), name)?;
        }
        Ok(())
    }
}

use std::collections::BTreeMap;
use std::fmt;

use tia_common::resolve_name;
use tracing::{info, warn};

use super::display::DisplayNode;
use crate::error::{Result, TiaError};
use crate::ports::{DisplayLayout, RemoteRef};

/// Options for a new display pane. `split_portion` defaults to an even
/// share: `1 / (n + 1)` with `n` existing displays.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisplayOptions {
    pub display_type: i32,
    pub display_subtype: i32,
    pub split_direction: i32,
    pub split_portion: Option<f64>,
}

impl DisplayOptions {
    pub fn with_split_portion(mut self, portion: f64) -> Self {
        self.split_portion = Some(portion);
        self
    }
}

pub struct WindowNode {
    name: String,
    remote: RemoteRef,
    displays: BTreeMap<String, DisplayNode>,
}

impl fmt::Debug for WindowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowNode")
            .field("name", &self.name)
            .field("displays", &self.displays)
            .finish()
    }
}

impl WindowNode {
    /// Creates the window remotely, then mirrors it.
    pub fn open(remote: RemoteRef, name: Option<&str>) -> Result<Self> {
        let name = remote.add_window(name)?;
        info!(window = %name, "Window opened");
        Self::load(remote, &name)
    }

    pub fn load(remote: RemoteRef, name: &str) -> Result<Self> {
        let mut window = Self {
            name: name.to_string(),
            remote,
            displays: BTreeMap::new(),
        };
        window.refresh()?;
        Ok(window)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn displays(&self) -> &BTreeMap<String, DisplayNode> {
        &self.displays
    }

    pub fn display(&self, name: &str) -> Option<&DisplayNode> {
        self.displays.get(name)
    }

    pub fn display_mut(&mut self, name: &str) -> Option<&mut DisplayNode> {
        self.displays.get_mut(name)
    }

    pub fn refresh(&mut self) -> Result<()> {
        let mut displays = BTreeMap::new();
        for name in self.remote.display_names(&self.name)? {
            let node = DisplayNode::load(self.remote.clone(), &self.name, &name)?;
            displays.insert(name, node);
        }
        self.displays = displays;
        Ok(())
    }

    pub fn add_display(&mut self, name: &str, options: DisplayOptions) -> Result<&DisplayNode> {
        let name = resolve_name(name, self.displays.keys());
        let split_portion = options
            .split_portion
            .unwrap_or_else(|| 1.0 / (self.displays.len() as f64 + 1.0));
        let layout = DisplayLayout {
            display_type: options.display_type,
            display_subtype: options.display_subtype,
            split_direction: options.split_direction,
            split_portion,
        };
        self.remote.add_display(&self.name, &name, layout)?;
        let node = DisplayNode::load(self.remote.clone(), &self.name, &name)?;
        info!(window = %self.name, display = %name, split_portion, "Display added");
        Ok(self.displays.entry(name).or_insert(node))
    }

    /// Adds `count` displays, each named from `name` with collisions resolved.
    pub fn add_displays(&mut self, name: &str, count: usize) -> Result<Vec<String>> {
        let mut added = Vec::with_capacity(count);
        for _ in 0..count {
            let display = self.add_display(name, DisplayOptions::default())?;
            added.push(display.name().to_string());
        }
        Ok(added)
    }

    /// Adds one image named from `name` to every display of this window.
    pub fn add_images_to_displays(
        &mut self,
        name: &str,
        size_x: u32,
        size_y: u32,
        calibration: &str,
    ) -> Result<()> {
        for display in self.displays.values_mut() {
            display.add_image(name, size_x, size_y, calibration)?;
        }
        Ok(())
    }

    /// Deleting a missing display logs a warning and succeeds.
    pub fn delete_display(&mut self, name: &str) -> Result<()> {
        if !self.displays.contains_key(name) {
            warn!(window = %self.name, display = name, "{}", TiaError::not_found("display", name));
            return Ok(());
        }
        match self.remote.delete_display(&self.name, name) {
            Ok(()) => {}
            Err(e) if e.is_remote_not_found() => {
                warn!(window = %self.name, display = name, error = %e, "Display already gone");
            }
            Err(e) => return Err(e),
        }
        self.displays.remove(name);
        info!(window = %self.name, display = name, "Display deleted");
        Ok(())
    }

    pub fn delete_all_displays(&mut self) -> Result<()> {
        let names: Vec<String> = self.displays.keys().cloned().collect();
        for name in names {
            self.delete_display(&name)?;
        }
        Ok(())
    }

    pub(crate) fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        writeln!(f, "{}{}", "\t".repeat(level), self.name)?;
        for display in self.displays.values() {
            display.fmt_tree(f, level + 1)?;
        }
        Ok(())
    }
}

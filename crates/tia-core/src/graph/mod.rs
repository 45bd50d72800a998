//! Client-side mirror of the remote window, display and image tree plus the
//! named-variable workspace.

mod display;
mod image;
mod window;

use std::collections::BTreeMap;
use std::fmt;

use tia_common::resolve_name;
use tracing::{info, warn};

pub use display::DisplayNode;
pub use image::ImageNode;
pub use window::DisplayOptions;
pub use window::WindowNode;

use crate::error::{Result, TiaError};
use crate::ports::RemoteRef;
use crate::values::{Calibration2D, Position2D, Range1D, Range2D};
use crate::workspace::{PositionCollection, SpatialUnit, ValueKind, ValueObject};

/// Borrowed view of one entry in [`SessionGraph::components`].
#[derive(Debug, Clone, Copy)]
pub enum ComponentRef<'a> {
    Window(&'a WindowNode),
    Display(&'a DisplayNode),
    Image(&'a ImageNode),
    Calibration(&'a Calibration2D),
    Range(&'a Range2D),
    Marker(&'a Position2D),
    Variable(&'a ValueObject),
}

/// Root of the mirror. Owns every window and every workspace variable.
pub struct SessionGraph {
    remote: RemoteRef,
    windows: BTreeMap<String, WindowNode>,
    workspace: BTreeMap<String, ValueObject>,
}

impl fmt::Debug for SessionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGraph")
            .field("windows", &self.windows)
            .field("workspace", &self.workspace)
            .finish()
    }
}

impl SessionGraph {
    /// Builds the mirror by full enumeration of the remote.
    pub fn new(remote: RemoteRef) -> Result<Self> {
        let mut graph = Self {
            remote,
            windows: BTreeMap::new(),
            workspace: BTreeMap::new(),
        };
        graph.refresh_all()?;
        Ok(graph)
    }

    pub fn remote(&self) -> &RemoteRef {
        &self.remote
    }

    pub fn windows(&self) -> &BTreeMap<String, WindowNode> {
        &self.windows
    }

    pub fn window(&self, name: &str) -> Option<&WindowNode> {
        self.windows.get(name)
    }

    pub fn window_mut(&mut self, name: &str) -> Option<&mut WindowNode> {
        self.windows.get_mut(name)
    }

    /// Like [`Self::window_mut`] but a miss is an error.
    pub fn require_window_mut(&mut self, name: &str) -> Result<&mut WindowNode> {
        self.windows
            .get_mut(name)
            .ok_or_else(|| TiaError::not_found("window", name))
    }

    /// Opens a window. A given name is made unique among known windows first.
    pub fn open(&mut self, name: Option<&str>) -> Result<&WindowNode> {
        let name = name.map(|n| resolve_name(n, self.windows.keys()));
        let window = WindowNode::open(self.remote.clone(), name.as_deref())?;
        let key = window.name().to_string();
        Ok(self.windows.entry(key).or_insert(window))
    }

    pub fn open_many(&mut self, name: Option<&str>, count: usize) -> Result<Vec<String>> {
        let mut opened = Vec::with_capacity(count);
        for _ in 0..count {
            let window = self.open(name)?;
            opened.push(window.name().to_string());
        }
        Ok(opened)
    }

    /// Closing an unknown window logs a warning and succeeds.
    pub fn close(&mut self, name: &str) -> Result<()> {
        if !self.windows.contains_key(name) {
            warn!(window = name, "{}", TiaError::not_found("window", name));
            return Ok(());
        }
        match self.remote.close_window(name) {
            Ok(()) => info!(window = name, "Window closed"),
            Err(e) if e.is_remote_not_found() => {
                warn!(window = name, error = %e, "Window was already closed remotely");
            }
            Err(e) => return Err(e),
        }
        self.windows.remove(name);
        Ok(())
    }

    pub fn close_all(&mut self) -> Result<()> {
        let names: Vec<String> = self.windows.keys().cloned().collect();
        for name in names {
            self.close(&name)?;
        }
        Ok(())
    }

    /// Activating an unknown window logs a warning and succeeds.
    pub fn activate(&self, name: &str) -> Result<()> {
        if !self.windows.contains_key(name) {
            warn!(window = name, "{}", TiaError::not_found("window", name));
            return Ok(());
        }
        self.remote.activate_window(name)
    }

    pub fn active_window_name(&self) -> Result<String> {
        self.remote.active_window_name()
    }

    /// Replaces the whole local tree and workspace from a fresh enumeration.
    pub fn refresh_all(&mut self) -> Result<()> {
        let mut windows = BTreeMap::new();
        for name in self.remote.window_names()? {
            let window = WindowNode::load(self.remote.clone(), &name)?;
            windows.insert(name, window);
        }

        let mut workspace = BTreeMap::new();
        for (varname, tag) in self.remote.workspace()? {
            let kind = ValueKind::from_tag(&tag);
            if let Some(value) = ValueObject::decode(&self.remote, &varname, &kind)? {
                workspace.insert(varname, value);
            }
        }

        self.windows = windows;
        self.workspace = workspace;
        Ok(())
    }

    pub fn variables(&self) -> &BTreeMap<String, ValueObject> {
        &self.workspace
    }

    pub fn variable(&self, varname: &str) -> Option<&ValueObject> {
        self.workspace.get(varname)
    }

    pub fn range2d(&self, varname: &str) -> Result<Range2D> {
        match self.workspace.get(varname) {
            Some(ValueObject::Range2D(range)) => Ok(*range),
            _ => Err(TiaError::not_found("Range2D variable", varname)),
        }
    }

    pub fn position_collection_mut(&mut self, varname: &str) -> Result<&mut PositionCollection> {
        match self.workspace.get_mut(varname) {
            Some(ValueObject::PositionCollection(collection)) => Ok(collection),
            _ => Err(TiaError::not_found("PositionCollection variable", varname)),
        }
    }

    pub fn spatial_unit_mut(&mut self, varname: &str) -> Result<&mut SpatialUnit> {
        match self.workspace.get_mut(varname) {
            Some(ValueObject::SpatialUnit(unit)) => Ok(unit),
            _ => Err(TiaError::not_found("SpatialUnit variable", varname)),
        }
    }

    fn register(&mut self, varname: &str, value: ValueObject) {
        info!(varname, kind = value.kind().tag(), "Workspace variable registered");
        self.workspace.insert(varname.to_string(), value);
    }

    /// Creates the variable remotely and registers the remote's canonical copy.
    pub fn add_calibration2d(
        &mut self,
        varname: &str,
        calibration: Calibration2D,
    ) -> Result<Calibration2D> {
        self.remote.create_calibration2d(varname, &calibration)?;
        let canonical = self.remote.read_calibration2d(varname)?;
        self.register(varname, ValueObject::Calibration2D(canonical));
        Ok(canonical)
    }

    pub fn add_range2d(
        &mut self,
        varname: &str,
        start: Position2D,
        end: Position2D,
    ) -> Result<Range2D> {
        Range2D::new(start, end)?;
        self.remote.create_range2d(varname, start, end)?;
        let canonical = self.remote.read_range2d(varname)?;
        self.register(varname, ValueObject::Range2D(canonical));
        Ok(canonical)
    }

    /// Re-creates an existing range variable with new bounds.
    pub fn update_range2d(
        &mut self,
        varname: &str,
        start: Position2D,
        end: Position2D,
    ) -> Result<Range2D> {
        self.range2d(varname)?;
        self.add_range2d(varname, start, end)
    }

    pub fn add_range1d(&mut self, varname: &str, start: f64, end: f64) -> Result<Range1D> {
        Range1D::new(start, end)?;
        self.remote.create_range1d(varname, start, end)?;
        let canonical = self.remote.read_range1d(varname)?;
        self.register(varname, ValueObject::Range1D(canonical));
        Ok(canonical)
    }

    pub fn add_position2d(&mut self, varname: &str, position: Position2D) -> Result<Position2D> {
        self.remote.create_position2d(varname, position)?;
        let canonical = self.remote.read_position2d(varname)?;
        self.register(varname, ValueObject::Position2D(canonical));
        Ok(canonical)
    }

    pub fn add_position_collection(&mut self, varname: &str) -> Result<&mut PositionCollection> {
        let collection = PositionCollection::create(self.remote.clone(), varname)?;
        self.register(varname, ValueObject::PositionCollection(collection));
        self.position_collection_mut(varname)
    }

    /// Copies positions `start..=stop` of `source` into a new collection variable.
    pub fn add_sub_collection(
        &mut self,
        source: &str,
        varname: &str,
        start: usize,
        stop: usize,
    ) -> Result<&mut PositionCollection> {
        let sub = self
            .position_collection_mut(source)?
            .sub_collection(varname, start, stop)?;
        self.register(varname, ValueObject::PositionCollection(sub));
        self.position_collection_mut(varname)
    }

    pub fn add_spatial_unit(&mut self, varname: &str, unit: &str) -> Result<&mut SpatialUnit> {
        let unit = SpatialUnit::create(self.remote.clone(), varname, unit)?;
        self.register(varname, ValueObject::SpatialUnit(unit));
        self.spatial_unit_mut(varname)
    }

    /// Flattened, non-owning view of every reachable object, keyed by path.
    pub fn components(&self) -> BTreeMap<String, ComponentRef<'_>> {
        let mut components = BTreeMap::new();
        for (window_name, window) in &self.windows {
            components.insert(window_name.clone(), ComponentRef::Window(window));
            for (display_name, display) in window.displays() {
                let display_key = format!("{}/{}", window_name, display_name);
                for (image_name, image) in display.images() {
                    let image_key = format!("{}/{}", display_key, image_name);
                    components.insert(
                        format!("{}/calibration", image_key),
                        ComponentRef::Calibration(&image.data().calibration),
                    );
                    components.insert(
                        format!("{}/range", image_key),
                        ComponentRef::Range(&image.data().range),
                    );
                    components.insert(image_key, ComponentRef::Image(image));
                }
                for (marker_name, marker) in display.position_markers() {
                    components.insert(
                        format!("{}/{}", display_key, marker_name),
                        ComponentRef::Marker(marker),
                    );
                }
                components.insert(display_key, ComponentRef::Display(display));
            }
        }
        for (varname, value) in &self.workspace {
            components.insert(varname.clone(), ComponentRef::Variable(value));
        }
        components
    }
}

impl fmt::Display for SessionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session")?;
        for window in self.windows.values() {
            window.fmt_tree(f, 1)?;
        }
        Ok(())
    }
}

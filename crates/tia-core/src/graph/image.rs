use std::fmt;

use crate::data2d::Data2D;
use crate::error::Result;
use crate::ports::RemoteRef;

/// An image object inside a display, with its data read from the remote.
pub struct ImageNode {
    name: String,
    window: String,
    display: String,
    remote: RemoteRef,
    data: Data2D,
}

impl fmt::Debug for ImageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageNode")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("display", &self.display)
            .finish_non_exhaustive()
    }
}

fn read_data(remote: &RemoteRef, window: &str, display: &str, name: &str) -> Result<Data2D> {
    let value = remote.image_array(window, display, name)?;
    let metadata = remote.image_metadata(window, display, name)?;
    Data2D::new(name, metadata, value)
}

impl ImageNode {
    pub fn load(remote: RemoteRef, window: &str, display: &str, name: &str) -> Result<Self> {
        let data = read_data(&remote, window, display, name)?;
        Ok(Self {
            name: name.to_string(),
            window: window.to_string(),
            display: display.to_string(),
            remote,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> &str {
        &self.window
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn data(&self) -> &Data2D {
        &self.data
    }

    /// Re-reads pixel values, calibration and range, and rebuilds the pixel grid.
    pub fn update_data(&mut self) -> Result<()> {
        self.data = read_data(&self.remote, &self.window, &self.display, &self.name)?;
        Ok(())
    }
}

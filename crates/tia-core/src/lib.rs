//! Client-side mirror of a TIA instrument session.
//!
//! Every component is built from a [`RemoteRef`], the explicitly owned
//! session reference. Only [`adapter`] talks to the remote handle; the rest
//! of the crate depends on the capability traits in [`ports`].

#![deny(clippy::all)]

mod acquisition;
pub mod adapter;
mod data2d;
mod error;
mod graph;
mod modes;
pub mod ports;
pub mod servers;
mod values;
mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use acquisition::AcquisitionController;
pub use acquisition::AcquisitionState;
pub use acquisition::SignalLink;
pub use acquisition::SignalsByType;
pub use adapter::RemoteAdapter;
pub use data2d::Data2D;
pub use data2d::ImageArray;
pub use data2d::ImageMetadata;
pub use data2d::PixelGrid;
pub use error::Result;
pub use error::TiaError;
pub use graph::ComponentRef;
pub use graph::DisplayNode;
pub use graph::DisplayOptions;
pub use graph::ImageNode;
pub use graph::SessionGraph;
pub use graph::WindowNode;
pub use modes::AcquireMode;
pub use modes::MagnificationMode;
pub use modes::ScanMode;
pub use modes::SignalType;
pub use ports::PropertyValue;
pub use ports::RemoteRef;
pub use ports::TiaRemote;
pub use servers::BeamControlProxy;
pub use servers::CcdServerProxy;
pub use servers::ScanningServerProxy;
pub use values::Calibration2D;
pub use values::Position2D;
pub use values::Range1D;
pub use values::Range2D;
pub use values::Unit;
pub use workspace::PositionCollection;
pub use workspace::SpatialUnit;
pub use workspace::ValueKind;
pub use workspace::ValueObject;
pub use workspace::VariableSummary;

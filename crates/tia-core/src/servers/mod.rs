//! Typed façades over the remote acquisition servers.
//!
//! Every setter is a two-phase write: the remote property is written first,
//! then the whole snapshot is re-read. If either step fails the previous
//! snapshot is kept and the error is returned.

mod beam;
mod ccd;
mod scanning;

pub use beam::BeamControlProxy;
pub use beam::BeamState;
pub use ccd::CcdAllowedRanges;
pub use ccd::CcdServerProxy;
pub use ccd::CcdState;
pub use scanning::Magnifications;
pub use scanning::ScanningAllowedRanges;
pub use scanning::ScanningServerProxy;
pub use scanning::ScanningState;

/// Remote object names used for property access.
pub(crate) mod objects {
    pub const ACQUISITION_MANAGER: &str = "AcquisitionManager";
    pub const SCANNING_SERVER: &str = "ScanningServer";
    pub const CCD_SERVER: &str = "CcdServer";
    pub const BEAM_CONTROL: &str = "BeamControl";
}

#![deny(clippy::all)]

mod json_ext;
mod naming;
mod sync;

pub use json_ext::ValueExt;
pub use naming::resolve_name;
pub use naming::split_numeric_suffix;
pub use sync::mutex_lock_or_recover;

#![deny(clippy::all)]

mod client;
pub mod error_codes;
mod error;
mod handle;
mod mock_handle;

pub use client::DEFAULT_ADDR;
pub use client::RemoteHandleConfig;
pub use client::TcpRemoteHandle;
pub use error::RemoteError;
pub use error_codes::ErrorCategory;
pub use handle::GET_PROPERTY;
pub use handle::RemoteHandle;
pub use handle::SET_PROPERTY;
pub use mock_handle::MockHandle;
pub use mock_handle::MockReply;

pub type Result<T> = std::result::Result<T, RemoteError>;

pub mod app;
pub mod args;
pub mod device;
pub mod error;
pub mod frame;
pub mod registry;
pub mod surface;
pub mod util;

#[cfg(windows)]
pub mod gfx;
#[cfg(windows)]
pub mod os;
#[cfg(windows)]
pub mod swapchain;

pub use error::{Error, Result};

pub mod frame;
pub mod skeleton;
pub mod surface;
#[cfg(feature = "desktop")]
pub mod window;

pub use frame::{draw_skeleton, FrameRenderer, OverlayStats, OverlayStyle};
pub use skeleton::SKELETON_CONNECTIONS;
pub use surface::{PixelBuffer, Surface};
#[cfg(feature = "desktop")]
pub use window::MinifbRenderer;

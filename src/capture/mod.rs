//! Video capture side of the recorder
//!
//! The proxy paints an incoming video track onto an owned surface at a fixed
//! cadence. Placeholder and passthrough collaborators cover the cases where
//! there is no real video or where video bypasses the surface.

pub mod compositor;
pub mod passthrough;
pub mod placeholder;
pub mod proxy;

pub use compositor::{FrameCompositor, Surface};
pub use passthrough::{PassthroughSlot, PassthroughVideo};
pub use placeholder::{PlaceholderKind, PlaceholderOptions, PlaceholderSource, SolidColorPlaceholder};
pub use proxy::{ProxySession, VideoSourceProxy};

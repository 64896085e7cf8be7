pub mod bridge;
pub mod markers;
#[cfg(test)]
pub(crate) mod scripted;

pub use bridge::{
    PageSurface, ScannedWidget, StorageProbe, StorageTier, SurfaceHandle, SurfaceRequest,
    SurfaceResponse,
};
pub use markers::{RawMarkers, SnapshotReader, TickStamp, VISUAL_CONTENT_TAGS};

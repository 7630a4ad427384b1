//! In-memory engines used by tests and the simulation host.

mod loader;
mod scene;
mod tween;

pub use loader::{probe, AssetLoader, LoadedAsset, LoaderMode};
pub use scene::{FilterKind, HeadlessRenderer, NodeKind};
pub use tween::TweenEngine;

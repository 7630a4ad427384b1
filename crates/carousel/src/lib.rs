//! Core of the Glimmer image carousel.
//!
//! The crate tracks every engine-backed object a slider creates and funnels
//! the slider's continuously firing effect sources onto one frame-aligned
//! pipeline. The overall flow is:
//!
//! ```text
//!   host input ──▶ Slider::pointer_* / key_down / resize
//!                        │ dispatch_event (ResourceLedger listeners)
//!                        ▼
//!   controllers ──▶ RenderScheduler::schedule(owner, kind, cb)   (deduplicated)
//!                        │
//!   Slider::frame(now):  timers ─▶ assets ─▶ flush ─▶ tweens ─▶ render ─▶ quality
//!                                              │
//!                                              └─▶ AnimationCoordinator ─▶ AnimationEngine
//! ```
//!
//! [`Stage`](stage::Stage) is the frame context every callback receives. It
//! owns the engines behind the [`RenderEngine`] and [`AnimationEngine`]
//! traits together with the [`ResourceLedger`], the scheduler, the
//! coordinator and the texture and quality managers. [`Slider`] is the
//! host-facing facade over it. The [`headless`] module provides in-memory
//! engines for tests and simulation.

pub mod controllers;
pub mod coordinator;
pub mod easing;
pub mod engine;
pub mod headless;
pub mod ledger;
pub mod props;
pub mod quality;
pub mod slider;
pub mod stage;
pub mod textures;
pub mod types;

pub use coordinator::{AnimationBatch, AnimationCoordinator, AnimationGroup, TweenRequest};
pub use easing::Easing;
pub use engine::{
    AnimationEngine, ApplicationConfig, AssetEvent, EngineDiagnostics, EngineError,
    PerformanceSample, PropertyAccess, RenderEngine, TextureInfo,
};
pub use ledger::{DisposalReport, EventTarget, EventType, InputEvent, LedgerStats, ResourceLedger};
pub use props::{SlideSource, SliderProps, TiltProps};
pub use quality::{QualityLevel, QualityManager, QualitySettings};
pub use slider::{FrameReport, Slider, SliderError, SliderStatus};
pub use textures::{LoadStatus, TextureCache, TextureOutcome};
pub use types::{
    AppId, FilterId, Key, NodeId, Point, Property, Size, Target, TextAlign, TextStyle, TextureId,
    TweenId,
};

use std::fmt;

use serde::Serialize;

macro_rules! handle_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        pub struct $name(pub u64);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

handle_id!(
    /// GPU texture owned by the rendering engine.
    TextureId
);
handle_id!(
    /// Scene-graph node: sprite, text, container or an application stage.
    NodeId
);
handle_id!(
    /// Shader filter instance (displacement, RGB split).
    FilterId
);
handle_id!(
    /// Render root owning the canvas and its scene graph.
    AppId
);
handle_id!(
    /// Tween or timeline handle issued by the animation engine.
    TweenId
);
handle_id!(ListenerId);
handle_id!(TimerId);

/// Anything the animation engine can interpolate properties on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    Node(NodeId),
    Filter(FilterId),
}

/// Numeric properties exposed by display objects and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Property {
    X,
    Y,
    ScaleX,
    ScaleY,
    Alpha,
    Rotation,
    /// Displacement filter strength along x.
    FilterScaleX,
    /// Displacement filter strength along y.
    FilterScaleY,
    /// RGB split red channel offset.
    SplitRed,
    /// RGB split blue channel offset.
    SplitBlue,
}

impl Property {
    /// Value a freshly created object reports for this property.
    pub fn initial_value(self) -> f32 {
        match self {
            Property::ScaleX | Property::ScaleY | Property::Alpha => 1.0,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn aspect(self) -> f32 {
        if self.height <= 0.0 {
            return 0.0;
        }
        self.width / self.height
    }

    pub fn center(self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Keys the slider reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Style options handed to the engine when creating text nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Font fallback chain, first available wins.
    pub font_family: Vec<String>,
    pub font_size: f32,
    pub font_weight: u16,
    pub fill: [f32; 4],
    pub letter_spacing: f32,
    pub align: TextAlign,
}

impl TextStyle {
    pub fn title() -> Self {
        Self {
            font_family: vec!["Inter".into(), "Helvetica Neue".into(), "sans-serif".into()],
            font_size: 64.0,
            font_weight: 700,
            fill: [1.0, 1.0, 1.0, 1.0],
            letter_spacing: 2.0,
            align: TextAlign::Center,
        }
    }

    pub fn subtitle() -> Self {
        Self {
            font_size: 24.0,
            font_weight: 400,
            letter_spacing: 1.0,
            ..Self::title()
        }
    }
}

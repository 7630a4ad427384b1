#![allow(dead_code)]

use std::time::{Duration, Instant};

use carousel::headless::{HeadlessRenderer, TweenEngine};
use carousel::{NodeId, Property, PropertyAccess, RenderEngine, Size, Slider, SliderProps, Target};

pub const VIEWPORT: Size = Size {
    width: 800.0,
    height: 600.0,
};
pub const FRAME: Duration = Duration::from_millis(16);

pub fn props(count: usize) -> SliderProps {
    let mut props = SliderProps::from_images((0..count).map(|i| format!("mem://1600x900/slide-{i}")));
    props.viewport = VIEWPORT;
    props
}

pub fn build(props: SliderProps) -> Slider {
    build_with(HeadlessRenderer::default(), props)
}

pub fn build_with(render: HeadlessRenderer, props: SliderProps) -> Slider {
    Slider::new(Box::new(render), Box::new(TweenEngine::new()), props).expect("slider")
}

/// Initialises and runs the first frame, which settles inline assets and
/// mounts every controller.
pub fn mount(props: SliderProps) -> (Slider, Instant) {
    let mut slider = build(props);
    let t0 = Instant::now();
    slider.initialize(VIEWPORT, t0).expect("initialize");
    slider.frame(t0);
    assert!(slider.is_ready(), "slider should be ready after the first frame");
    (slider, t0)
}

/// Steps frames until `until`, returning the time of the last frame.
pub fn run_until(slider: &mut Slider, from: Instant, until: Instant) -> Instant {
    let mut now = from;
    while now < until {
        now += FRAME;
        slider.frame(now);
    }
    now
}

/// Steps frames until no transition is running.
pub fn settle(slider: &mut Slider, from: Instant) -> Instant {
    let mut now = from;
    for _ in 0..400 {
        now += FRAME;
        slider.frame(now);
        if !slider.status().transitioning {
            break;
        }
    }
    assert!(!slider.status().transitioning, "transition never settled");
    now
}

pub fn node_property(slider: &Slider, node: NodeId, property: Property) -> f32 {
    slider
        .render()
        .property(Target::Node(node), property)
        .expect("node property")
}

pub fn visible_slides(slider: &Slider) -> Vec<usize> {
    let scene = slider.scene().expect("scene");
    scene
        .slides
        .iter()
        .enumerate()
        .filter(|(_, node)| slider.render().is_visible(**node) == Some(true))
        .map(|(index, _)| index)
        .collect()
}

pub fn base_filter_scale(slider: &Slider) -> f32 {
    let filter = slider
        .scene()
        .and_then(|scene| scene.displacement)
        .and_then(|rig| rig.filter)
        .expect("displacement filter");
    slider
        .render()
        .property(Target::Filter(filter), Property::FilterScaleX)
        .expect("filter scale")
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

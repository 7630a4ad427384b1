mod common;

use std::time::{Duration, Instant};

use carousel::controllers::Lifecycle;
use carousel::headless::HeadlessRenderer;
use carousel::{Point, RenderEngine, SliderError, SliderProps};
use common::*;

#[test]
fn empty_slide_list_is_rejected() {
    let result = carousel::Slider::new(
        Box::new(HeadlessRenderer::default()),
        Box::new(carousel::headless::TweenEngine::new()),
        SliderProps::new(Vec::new()),
    );
    assert!(matches!(result, Err(SliderError::NoSlides)));
}

#[test]
fn first_frame_mounts_every_enabled_controller() {
    let (slider, _) = mount(props(3));
    let status = slider.status();
    assert_eq!(status.lifecycle, Lifecycle::Active);
    assert!(!status.loading);
    assert_eq!(status.pending_textures, 0);
    for lifecycle in [
        status.controllers.pointer,
        status.controllers.idle,
        status.controllers.resize,
        status.controllers.transition,
        status.controllers.drag,
        status.controllers.keyboard,
    ] {
        assert_eq!(lifecycle, Lifecycle::Active);
    }
    assert_eq!(status.controllers.autoplay, Lifecycle::Uninitialized);
    assert_eq!(status.ledger.applications, 1);
    assert_eq!(status.ledger.textures, 3);
}

#[test]
fn initialize_twice_is_a_no_op() {
    let mut slider = build(props(2));
    let t0 = Instant::now();
    slider.initialize(VIEWPORT, t0).expect("initialize");
    slider.initialize(VIEWPORT, t0).expect("second initialize");
    slider.frame(t0);
    slider.initialize(VIEWPORT, t0).expect("initialize after mount");
    assert_eq!(slider.status().engine.applications, 1);
}

#[test]
fn initial_index_is_shown_first() {
    let mut props = props(3);
    props.initial_index = 2;
    let (slider, _) = mount(props);
    assert_eq!(slider.current_index(), 2);
    assert_eq!(visible_slides(&slider), vec![2]);
}

#[test]
fn missing_image_gets_a_placeholder() {
    let mut props = props(3);
    props.slides[1].image = "missing://broken".into();
    let (slider, _) = mount(props);
    let status = slider.status();
    assert!(status.ready);
    assert!(!status.fallback);
    assert_eq!(slider.scene().expect("scene").len(), 3);
    assert_eq!(status.ledger.textures, 2);
}

#[test]
fn missing_displacement_map_skips_the_filter() {
    let mut props = props(2);
    props.displacement_map = Some("missing://map".into());
    let (slider, _) = mount(props);
    let scene = slider.scene().expect("scene");
    assert!(scene.displacement.is_none());
    assert!(slider.render().filters(scene.slide_container).is_empty());
}

#[test]
fn failed_render_root_falls_back() {
    let mut render = HeadlessRenderer::default();
    render.set_fail_applications(true);
    let mut slider = build_with(render, props(2));
    let t0 = Instant::now();
    let error = slider.initialize(VIEWPORT, t0).unwrap_err();
    assert!(matches!(error, SliderError::Engine(_)));

    slider.frame(t0 + FRAME);
    let status = slider.status();
    assert!(status.fallback);
    assert!(!status.ready);
    assert!(!slider.go_next());
    assert_eq!(slider.pointer_move(Point::new(1.0, 1.0), t0), 0);
    assert!(!slider.dispose().already_disposed);
}

#[test]
fn dispose_releases_everything_once() {
    let mut props = props(3);
    props.displacement_map = Some("mem://512x512/map".into());
    props.cursor_map = Some("mem://256x256/cursor".into());
    props.cursor_scale = Some(12.0);
    props.rgb_split = Some(2.0);
    let (mut slider, t0) = mount(props);
    slider.pointer_enter(Point::new(100.0, 100.0), t0);
    slider.pointer_move(Point::new(120.0, 80.0), t0);
    slider.go_next();
    run_until(&mut slider, t0, t0 + Duration::from_millis(200));

    let report = slider.dispose();
    assert!(!report.already_disposed);
    assert_eq!(report.errors, 0);
    assert_eq!(report.applications_destroyed, 1);
    assert_eq!(report.textures_destroyed, 5);
    // Controllers unbind their own listeners before the ledger sweep.
    assert_eq!(report.listeners_removed, 0);

    let status = slider.status();
    assert_eq!(status.lifecycle, Lifecycle::Disposed);
    assert!(status.ledger.is_empty());
    assert_eq!(status.pending_updates, 0);
    assert_eq!(status.engine.applications, 0);
    assert_eq!(status.engine.nodes, 0);
    assert_eq!(status.engine.filters, 0);
    assert_eq!(status.engine.textures, 0);
    assert_eq!(status.engine.rejected_destroys, 0);

    let again = slider.dispose();
    assert!(again.already_disposed);
    assert_eq!(slider.disposal(), Some(&report));
    assert_eq!(slider.status().engine.rejected_destroys, 0);
}

#[test]
fn disposed_slider_ignores_input_and_frames() {
    let (mut slider, t0) = mount(props(2));
    slider.dispose();
    assert_eq!(slider.pointer_move(Point::new(5.0, 5.0), t0), 0);
    assert!(!slider.go_next());
    let report = slider.frame(t0 + FRAME);
    assert_eq!(report.flush.executed, 0);
    assert!(slider.scene().is_none());
    assert!(matches!(
        slider.initialize(VIEWPORT, t0),
        Err(SliderError::Disposed(_))
    ));
}

#[test]
fn assets_settling_after_dispose_are_released() {
    let mut slider = build(props(3));
    let t0 = Instant::now();
    slider.initialize(VIEWPORT, t0).expect("initialize");
    let report = slider.dispose();
    assert!(!report.already_disposed);

    let status = slider.status();
    assert!(!status.ready);
    assert_eq!(status.pending_textures, 0);
    assert_eq!(status.engine.textures, 0);
    assert_eq!(status.engine.nodes, 0);
    assert_eq!(status.engine.rejected_destroys, 0);
}

#[test]
fn dispose_before_initialize_is_harmless() {
    let mut slider = build(props(1));
    let report = slider.dispose();
    assert_eq!(report.applications_destroyed, 0);
    assert!(slider.dispose().already_disposed);
}

#[test]
fn status_serialises_for_hosts() {
    let (slider, _) = mount(props(2));
    let status = slider.status();
    assert!(status.instance.starts_with("slider-"));

    let json = serde_json::to_value(&status).expect("status json");
    assert_eq!(json["quality"], "high");
    assert_eq!(json["lifecycle"], "active");
    assert_eq!(json["current_index"], 0);
    assert_eq!(json["controllers"]["autoplay"], "uninitialized");
}

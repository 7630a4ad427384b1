mod common;

use std::time::Duration;

use carousel::headless::{HeadlessRenderer, TweenEngine};
use carousel::{Key, Point, Property, Slider};
use common::*;
use scheduler::UpdateKind;

fn assert_only_visible(slider: &carousel::Slider, index: usize) {
    assert_eq!(visible_slides(slider), vec![index]);
    let scene = slider.scene().expect("scene");
    for (i, node) in scene.slides.iter().enumerate() {
        let alpha = node_property(slider, *node, Property::Alpha);
        let expected = if i == index { 1.0 } else { 0.0 };
        assert!(approx(alpha, expected), "slide {i} alpha {alpha}");
    }
}

#[test]
fn next_cycles_through_slides_and_wraps() {
    let (mut slider, t0) = mount(props(3));
    assert_only_visible(&slider, 0);

    let mut now = t0;
    for expected in [1, 2, 0] {
        assert!(slider.go_next());
        assert_eq!(slider.current_index(), expected);
        assert!(slider.status().transitioning);
        now = settle(&mut slider, now);
        assert_only_visible(&slider, expected);
    }
    assert_eq!(slider.status().counters.transitions, 3);
}

#[test]
fn prev_wraps_to_last_slide() {
    let (mut slider, t0) = mount(props(3));
    assert!(slider.go_prev());
    assert_eq!(slider.current_index(), 2);
    settle(&mut slider, t0);
    assert_only_visible(&slider, 2);
}

#[test]
fn out_of_range_and_current_index_are_ignored() {
    let (mut slider, t0) = mount(props(3));
    assert!(!slider.transition_to(3));
    assert!(!slider.transition_to(0));
    assert_eq!(slider.current_index(), 0);

    let report = slider.frame(t0 + FRAME);
    assert!(!report.flush.kinds().contains(&UpdateKind::SlideTransition));
    assert!(!slider.status().transitioning);
}

#[test]
fn navigation_before_mount_is_refused() {
    let mut slider = build(props(3));
    assert!(!slider.go_next());
    assert_eq!(slider.current_index(), 0);
}

#[test]
fn navigation_within_one_frame_collapses_into_one_transition() {
    let (mut slider, t0) = mount(props(4));
    assert!(slider.go_next());
    assert!(slider.go_next());
    assert_eq!(slider.current_index(), 2);

    let report = slider.frame(t0 + FRAME);
    let transitions = report
        .flush
        .order
        .iter()
        .filter(|key| key.kind == UpdateKind::SlideTransition)
        .count();
    assert_eq!(transitions, 1);
    assert_eq!(report.flush.coalesced, 1);

    settle(&mut slider, t0 + FRAME);
    assert_only_visible(&slider, 2);
    assert_eq!(slider.status().counters.transitions, 1);
}

#[test]
fn navigating_back_in_the_same_frame_runs_no_transition() {
    let (mut slider, t0) = mount(props(3));
    assert!(slider.go_next());
    assert!(slider.go_prev());
    slider.frame(t0 + FRAME);
    assert!(!slider.status().transitioning);
    assert_only_visible(&slider, 0);
}

#[test]
fn interrupted_transition_snaps_then_continues() {
    let (mut slider, t0) = mount(props(3));
    assert!(slider.go_next());
    let now = run_until(&mut slider, t0, t0 + Duration::from_millis(300));
    assert_eq!(visible_slides(&slider), vec![0, 1]);

    assert!(slider.go_next());
    let now = settle(&mut slider, now);
    assert_only_visible(&slider, 2);

    let status = slider.status();
    assert_eq!(status.counters.transitions, 1);
    assert_eq!(status.animations.live, 0);
    assert!(now > t0);
}

#[test]
fn settled_slide_returns_to_cover_scale() {
    let (mut slider, t0) = mount(props(2));
    slider.go_next();
    settle(&mut slider, t0);
    let scene = slider.scene().expect("scene");
    let node = scene.slides[1];
    let scale = node_property(&slider, node, Property::ScaleX);
    assert!(approx(scale, 600.0 / 900.0), "scale {scale}");
}

#[test]
fn arrow_keys_navigate() {
    let (mut slider, t0) = mount(props(3));
    assert!(slider.key_down(Key::ArrowRight, t0) > 0);
    assert_eq!(slider.current_index(), 1);
    slider.key_down(Key::ArrowLeft, t0);
    slider.key_down(Key::ArrowLeft, t0);
    assert_eq!(slider.current_index(), 2);
    slider.key_down(Key::Other, t0);
    assert_eq!(slider.current_index(), 2);
}

#[test]
fn keyboard_can_be_disabled() {
    let mut props = props(3);
    props.keyboard = false;
    let (mut slider, t0) = mount(props);
    slider.key_down(Key::ArrowRight, t0);
    assert_eq!(slider.current_index(), 0);
    assert_eq!(
        slider.status().controllers.keyboard,
        carousel::controllers::Lifecycle::Uninitialized
    );
}

#[test]
fn long_swipe_left_advances() {
    let (mut slider, t0) = mount(props(3));
    slider.pointer_down(Point::new(600.0, 300.0), t0);
    slider.pointer_move(Point::new(300.0, 300.0), t0);
    slider.pointer_up(Point::new(300.0, 300.0), t0);
    assert_eq!(slider.current_index(), 1);
    assert_eq!(slider.status().counters.swipes, 1);
}

#[test]
fn long_swipe_right_goes_back() {
    let (mut slider, t0) = mount(props(3));
    slider.pointer_down(Point::new(100.0, 300.0), t0);
    slider.pointer_up(Point::new(500.0, 300.0), t0);
    assert_eq!(slider.current_index(), 2);
}

#[test]
fn short_drag_snaps_back_without_navigating() {
    let (mut slider, t0) = mount(props(3));
    slider.pointer_down(Point::new(400.0, 300.0), t0);
    let now = run_until(&mut slider, t0, t0 + Duration::from_millis(100));
    slider.pointer_up(Point::new(350.0, 300.0), now);
    assert_eq!(slider.current_index(), 0);

    run_until(&mut slider, now, now + Duration::from_millis(500));
    let scene = slider.scene().expect("scene");
    let scale = node_property(&slider, scene.slides[0], Property::ScaleX);
    assert!(approx(scale, scene.base_scale(0)), "scale {scale}");
    assert_eq!(slider.status().counters.swipes, 0);
}

#[test]
fn leaving_mid_drag_completes_the_swipe() {
    let (mut slider, t0) = mount(props(3));
    slider.pointer_down(Point::new(700.0, 300.0), t0);
    slider.pointer_move(Point::new(100.0, 300.0), t0);
    slider.pointer_leave(t0);
    assert_eq!(slider.current_index(), 1);
}

#[test]
fn transition_takes_over_a_pressed_slide() {
    let (mut slider, t0) = mount(props(3));
    let outgoing = slider.scene().expect("scene").slides[0];
    slider.pointer_down(Point::new(400.0, 300.0), t0);
    let mut now = t0 + FRAME;
    slider.frame(now);
    assert!(slider.key_down(Key::ArrowRight, now) > 0);

    let mut previous = node_property(&slider, outgoing, Property::ScaleX);
    for _ in 0..20 {
        now += FRAME;
        slider.frame(now);
        let scale = node_property(&slider, outgoing, Property::ScaleX);
        assert!(scale >= previous - 1e-6, "outgoing scale fell from {previous} to {scale}");
        previous = scale;
        assert_eq!(slider.status().animations.live, 1);
    }
    assert!(slider.status().transitioning);
    settle(&mut slider, now);
    assert_only_visible(&slider, 1);
}

#[test]
fn rejected_timeline_lands_on_the_target() {
    let mut tweens = TweenEngine::new();
    tweens.set_fail_timelines(true);
    let mut slider = Slider::new(Box::new(HeadlessRenderer::default()), Box::new(tweens), props(3))
        .expect("slider");
    let t0 = std::time::Instant::now();
    slider.initialize(VIEWPORT, t0).expect("initialize");
    slider.frame(t0);
    assert!(slider.is_ready());

    assert!(slider.go_next());
    let report = slider.frame(t0 + FRAME);
    assert_eq!(report.flush.failed, 1);
    assert!(!slider.status().transitioning);
    assert_only_visible(&slider, 1);
    assert_eq!(slider.status().animations.live, 0);

    assert!(slider.go_next());
    slider.frame(t0 + FRAME * 2);
    assert!(!slider.status().transitioning);
    assert_only_visible(&slider, 2);
}

#[test]
fn autoplay_advances_on_its_period() {
    let mut props = props(3);
    props.autoplay = Some(Duration::from_millis(500));
    let (mut slider, t0) = mount(props);
    run_until(&mut slider, t0, t0 + Duration::from_millis(520));
    assert_eq!(slider.current_index(), 1);
    assert_eq!(slider.status().counters.autoplay_advances, 1);
}

#[test]
fn autoplay_waits_while_pointer_is_engaged() {
    let mut props = props(3);
    props.autoplay = Some(Duration::from_millis(500));
    let (mut slider, t0) = mount(props);
    slider.pointer_enter(Point::new(400.0, 300.0), t0);
    run_until(&mut slider, t0, t0 + Duration::from_millis(1200));
    assert_eq!(slider.current_index(), 0);
    assert_eq!(slider.status().counters.autoplay_advances, 0);
}

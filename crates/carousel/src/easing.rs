/// Interpolation curves understood by the animation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    Linear,
    Smoothstep,
    #[default]
    EaseInOut,
    QuadOut,
    CubicOut,
    ExpoOut,
}

impl Easing {
    pub fn sample(self, t: f32) -> f32 {
        let clamped = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => clamped,
            Easing::Smoothstep => clamped * clamped * (3.0 - 2.0 * clamped),
            Easing::EaseInOut => {
                if clamped < 0.5 {
                    2.0 * clamped * clamped
                } else {
                    -1.0 + (4.0 - 2.0 * clamped) * clamped
                }
            }
            Easing::QuadOut => 1.0 - (1.0 - clamped) * (1.0 - clamped),
            Easing::CubicOut => 1.0 - (1.0 - clamped).powi(3),
            Easing::ExpoOut => {
                if clamped >= 1.0 {
                    1.0
                } else {
                    1.0 - 2f32.powf(-10.0 * clamped)
                }
            }
        }
    }

    /// Interpolates between `from` and `to` at progress `t`.
    pub fn lerp(self, from: f32, to: f32, t: f32) -> f32 {
        from + (to - from) * self.sample(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 6] = [
        Easing::Linear,
        Easing::Smoothstep,
        Easing::EaseInOut,
        Easing::QuadOut,
        Easing::CubicOut,
        Easing::ExpoOut,
    ];

    #[test]
    fn every_curve_hits_its_endpoints() {
        for curve in ALL {
            assert!(curve.sample(0.0).abs() < 1e-6, "{curve:?} at 0");
            assert!((curve.sample(1.0) - 1.0).abs() < 1e-6, "{curve:?} at 1");
        }
    }

    #[test]
    fn curves_are_monotonic() {
        for curve in ALL {
            let mut last = 0.0;
            for step in 0..=20 {
                let sample = curve.sample(step as f32 / 20.0);
                assert!(sample >= last - 1e-6, "{curve:?} dipped at step {step}");
                last = sample;
            }
        }
    }

    #[test]
    fn ease_in_out_accelerates_then_decelerates() {
        let curve = Easing::EaseInOut;
        assert!(curve.sample(0.25) < curve.sample(0.5));
        assert!(curve.sample(0.75) > curve.sample(0.5));
        assert!((curve.sample(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn out_curves_lead_linear() {
        for curve in [Easing::QuadOut, Easing::CubicOut, Easing::ExpoOut] {
            assert!(curve.sample(0.3) > Easing::Linear.sample(0.3));
        }
    }

    #[test]
    fn lerp_clamps_progress() {
        assert_eq!(Easing::Linear.lerp(10.0, 20.0, 2.0), 20.0);
        assert_eq!(Easing::Linear.lerp(10.0, 20.0, -1.0), 10.0);
    }
}

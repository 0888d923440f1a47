//! Speed curve and stepped acceleration

use snh_player::playback::speed::{AccelSchedule, AccelState, SpeedCurve};
use snh_player::CascataPreset;

fn curve() -> SpeedCurve {
    let preset = CascataPreset::default();
    SpeedCurve::new(preset.speed_exponent, preset.speed_max_mult, preset.video_speed_cap)
}

#[test]
fn test_multiplier_bounded_and_increasing() {
    let curve = curve();
    for duration in [20.0, 22.0, 24.0, 25.0, 26.0] {
        let mut last = 0.0;
        for i in 1..=1000 {
            let elapsed = duration * i as f64 / 1000.0;
            let m = curve.multiplier(elapsed, duration);
            assert!((1.0..=19.0).contains(&m));
            assert!(m > last, "not increasing at {}", elapsed);
            last = m;
        }
    }
    assert_eq!(curve.multiplier(0.0, 20.0), 1.0);
    assert_eq!(curve.multiplier(20.0, 20.0), 19.0);
}

#[test]
fn test_video_multiplier_capped() {
    let curve = curve();
    for i in 0..=200 {
        let elapsed = i as f64 * 0.1;
        assert!(curve.video_multiplier(elapsed, 20.0) <= 6.0);
    }
    assert_eq!(curve.video_multiplier(20.0, 20.0), 6.0);
    assert!(curve.multiplier(19.0, 20.0) > 6.0);
}

#[test]
fn test_acceleration_steps_from_start() {
    // 20s score with the acceleration phase at 0.74
    let schedule = AccelSchedule::new(20.0 * 0.74, 0.5, 0.05);
    assert_eq!(schedule.steps(14.0), 0);
    assert_eq!(schedule.steps(14.8), 0);
    assert_eq!(schedule.steps(15.3), 1);
    assert_eq!(schedule.steps(19.9), 10);
    assert!((schedule.rate(15.3) - 1.05).abs() < 1e-9);
}

#[test]
fn test_state_reports_only_changes() {
    let mut state = AccelState::new(AccelSchedule::new(14.8, 0.5, 0.05));
    assert_eq!(state.update(10.0), None);
    assert_eq!(state.update(15.0), None);
    assert!(state.update(15.3).is_some());
    assert_eq!(state.update(15.4), None);
    assert_eq!(state.steps(), 1);
    state.reset();
    assert_eq!(state.rate(), 1.0);
}

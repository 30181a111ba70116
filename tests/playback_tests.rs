// Unit tests for the playback scheduler.
//
// The scheduler is the pure core of the output path: given a clock reading
// and a buffer duration it must produce gapless, non-overlapping, strictly
// ordered start times that never fall in the past.

use std::time::Duration;
use voicelink::PlaybackScheduler;

const GUARD: Duration = Duration::from_millis(10);

#[test]
fn test_first_frame_schedules_at_current_time() {
    let mut scheduler = PlaybackScheduler::new(Duration::ZERO);

    // Cursor starts at zero, so the first frame plays immediately.
    let start = scheduler.schedule(5.0, 0.1);

    assert_eq!(start, 5.0);
    assert_eq!(scheduler.next_play_time(), 5.1);
}

#[test]
fn test_guard_offset_keeps_start_out_of_the_past() {
    let mut scheduler = PlaybackScheduler::new(GUARD);

    let start = scheduler.schedule(1.0, 0.1);

    assert!(start >= 1.0, "Start time must not be in the past");
    assert!((start - 1.01).abs() < 1e-9);
}

#[test]
fn test_back_to_back_frames_are_gapless() {
    let mut scheduler = PlaybackScheduler::new(GUARD);

    // Frames arriving faster than real time chain off the cursor.
    let first = scheduler.schedule(0.0, 0.25);
    let second = scheduler.schedule(0.0, 0.25);
    let third = scheduler.schedule(0.0, 0.25);

    assert!((second - (first + 0.25)).abs() < 1e-9, "No gap after first");
    assert!((third - (second + 0.25)).abs() < 1e-9, "No gap after second");
}

#[test]
fn test_late_frames_restart_from_the_clock() {
    let mut scheduler = PlaybackScheduler::new(GUARD);

    scheduler.schedule(0.0, 0.1);
    // The stream went quiet; the next frame arrives long after the cursor.
    let start = scheduler.schedule(10.0, 0.1);

    assert!((start - 10.01).abs() < 1e-9);
}

#[test]
fn test_schedule_properties_over_arbitrary_sequence() {
    let mut scheduler = PlaybackScheduler::new(GUARD);
    let durations = [0.02, 0.5, 0.01, 0.08, 0.3, 0.02, 0.02];

    // A clock that creeps forward more slowly than audio accumulates.
    let mut now = 0.0;
    let mut previous: Option<(f64, f64)> = None;

    for &duration in &durations {
        let start = scheduler.schedule(now, duration);

        assert!(start >= now, "Playback scheduled in the past");
        if let Some((prev_start, prev_duration)) = previous {
            assert!(start >= prev_start, "Start times must be non-decreasing");
            assert!(
                start >= prev_start + prev_duration - 1e-9,
                "Buffers must not overlap"
            );
        }

        previous = Some((start, duration));
        now += 0.005;
    }
}

#[test]
fn test_reset_returns_cursor_to_zero() {
    let mut scheduler = PlaybackScheduler::new(GUARD);

    scheduler.schedule(3.0, 1.0);
    assert!(scheduler.next_play_time() > 0.0);

    scheduler.reset();
    assert_eq!(scheduler.next_play_time(), 0.0);
}

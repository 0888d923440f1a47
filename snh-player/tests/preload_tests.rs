//! Preload timeouts and partial results on the paused tokio clock

use std::time::Duration;

use snh_player::media::headless::{HeadlessBackend, HeadlessConfig};
use snh_player::media::{ImageHandle, MediaElement, ReadyState};
use snh_player::preload::{is_drawable, Preloader};
use snh_player::score::{AudioMix, AudioRole, ChannelEvent, ChannelKind, Score};
use tokio::time::Instant;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(15);

fn score(images: &[&str], videos: &[&str], audio: &[&str]) -> Score {
    Score {
        id: Uuid::new_v4(),
        duration: 20.0,
        accel_start: 14.8,
        channels: vec![ChannelEvent {
            kind: ChannelKind::Audio {
                role: AudioRole::Ambient,
                mix: AudioMix {
                    gain: 1.0,
                    fade_in: 2.0,
                    fade_out: 2.0,
                    end_offset: 0.0,
                },
            },
            enter_at: 1.0,
            pool: audio.iter().map(|s| s.to_string()).collect(),
        }],
        shared_images: images.iter().map(|s| s.to_string()).collect(),
        shared_videos: videos.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_hanging_image_settles_at_timeout() {
    let backend = HeadlessBackend::new(HeadlessConfig::default().hanging("slow.png"));
    let preloader = Preloader::new(backend.clone(), TIMEOUT);
    let score = score(&["slow.png", "fast.png"], &[], &[]);

    let started = Instant::now();
    let mut last = None;
    let (table, report) = preloader.preload(&score, |p| last = Some(p)).await;
    let waited = started.elapsed();

    assert!(waited >= TIMEOUT);
    assert!(waited < TIMEOUT + Duration::from_millis(500));
    assert_eq!(report.timed_out, 1);
    assert_eq!(table.images.len(), 1);
    assert_eq!(table.images[0].url(), "fast.png");
    let last = last.unwrap();
    assert_eq!(last.loaded, last.total);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_media_kept_as_stalled_elements() {
    let backend = HeadlessBackend::new(
        HeadlessConfig::default()
            .hanging("slow.mp4")
            .hanging("slow.mp3"),
    );
    let preloader = Preloader::new(backend.clone(), TIMEOUT);
    let score = score(&[], &["slow.mp4"], &["slow.mp3", "ok.mp3"]);

    let (table, report) = preloader.preload(&score, |_| {}).await;

    assert_eq!(report.total, 3);
    assert_eq!(report.ready, 1);
    assert_eq!(report.timed_out, 2);
    assert_eq!(table.videos.len(), 1);
    assert!(!is_drawable(table.videos[0].as_ref()));
    assert!(backend.element_by_src("slow.mp4").unwrap().looping);

    let members = &table.audio[0];
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].src().as_deref(), Some("slow.mp3"));
    assert_eq!(members[0].ready_state(), ReadyState::HaveNothing);
    assert_eq!(members[1].src().as_deref(), Some("ok.mp3"));
}

#[tokio::test(start_paused = true)]
async fn test_fast_items_do_not_wait_for_slow_ones() {
    let backend = HeadlessBackend::new(HeadlessConfig::default().hanging("slow.png"));
    let preloader = Preloader::new(backend.clone(), TIMEOUT);
    let score = score(&["slow.png", "a.png", "b.png"], &[], &[]);

    let started = Instant::now();
    let mut settled_at = Vec::new();
    preloader
        .preload(&score, |_| settled_at.push(started.elapsed()))
        .await;

    assert_eq!(settled_at.len(), 3);
    assert!(settled_at[0] < Duration::from_secs(1));
    assert!(settled_at[1] < Duration::from_secs(1));
    assert!(settled_at[2] >= TIMEOUT);
}

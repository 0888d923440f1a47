//! Preloader
//!
//! Resolves every resource a [`Score`] references before playback starts.
//! Each item is one `load(url)` future raced against the per-item timeout;
//! all items run concurrently and the gather completes only once every item
//! has settled (loaded, failed or timed out). Progress is reported after
//! each settlement.
//!
//! Settlement policy per item:
//!
//! | outcome   | image  | video / audio                               |
//! |-----------|--------|---------------------------------------------|
//! | loaded    | kept   | kept                                        |
//! | failed    | absent | absent                                      |
//! | timed out | absent | kept as a stalled element still loading     |
//!
//! Stalled elements are drawn or played only once they report enough data,
//! and are released with everything else at cleanup.

use crate::media::{
    AudioHandle, ImageHandle, LoadError, MediaBackend, MediaElement, ReadyState, VideoHandle,
};
use crate::score::{ChannelKind, Score};
use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// `(loaded, total)` after one item settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadProgress {
    pub loaded: usize,
    pub total: usize,
}

/// Counts for a finished preload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    pub total: usize,
    pub ready: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// URLs that failed or timed out, with the reason
    pub errors: Vec<LoadError>,
}

/// Handles resolved for one score
///
/// Image and video lists are compacted: absent items are dropped, so every
/// index refers to a usable handle. Audio lists are indexed by channel
/// position in the score (empty for visual channels).
#[derive(Default)]
pub struct ResourceTable {
    pub images: Vec<Box<dyn ImageHandle>>,
    pub videos: Vec<Box<dyn VideoHandle>>,
    pub audio: Vec<Vec<Box<dyn AudioHandle>>>,
}

impl ResourceTable {
    /// Pause and release every element
    pub fn release_all(&mut self) {
        for video in &mut self.videos {
            video.release();
        }
        for channel in &mut self.audio {
            for audio in channel.iter_mut() {
                audio.release();
            }
        }
        self.images.clear();
        self.videos.clear();
        self.audio.clear();
    }

    pub fn element_count(&self) -> usize {
        self.videos.len() + self.audio.iter().map(Vec::len).sum::<usize>()
    }
}

enum Slot {
    Image(usize),
    Video(usize),
    Audio { channel: usize, member: usize },
}

enum Resolved {
    Image(Box<dyn ImageHandle>),
    Video(Box<dyn VideoHandle>),
    Audio(Box<dyn AudioHandle>),
}

enum Settled {
    Ready(Resolved),
    Stalled(Resolved, LoadError),
    Absent(LoadError),
}

/// Resolves scores against a media backend
#[derive(Clone)]
pub struct Preloader<B: MediaBackend> {
    backend: B,
    timeout: Duration,
}

impl<B: MediaBackend> Preloader<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve every resource of `score`
    ///
    /// Never fails: per-item failures are recorded in the report and leave
    /// the item absent.
    pub async fn preload<F>(&self, score: &Score, mut on_progress: F) -> (ResourceTable, PreloadReport)
    where
        F: FnMut(PreloadProgress),
    {
        let mut pending: FuturesUnordered<LocalBoxFuture<'static, (Slot, Settled)>> =
            FuturesUnordered::new();

        for (i, url) in score.shared_images.iter().enumerate() {
            pending.push(self.image_item(i, url));
        }
        for (i, url) in score.shared_videos.iter().enumerate() {
            pending.push(self.video_item(i, url));
        }
        for (channel, event) in score.channels.iter().enumerate() {
            if let ChannelKind::Audio { .. } = event.kind {
                for (member, url) in event.pool.iter().enumerate() {
                    pending.push(self.audio_item(channel, member, url));
                }
            }
        }

        let total = pending.len();
        let mut report = PreloadReport {
            total,
            ..PreloadReport::default()
        };

        let mut images: Vec<Option<Box<dyn ImageHandle>>> =
            (0..score.shared_images.len()).map(|_| None).collect();
        let mut videos: Vec<Option<Box<dyn VideoHandle>>> =
            (0..score.shared_videos.len()).map(|_| None).collect();
        let mut audio: Vec<Vec<Option<Box<dyn AudioHandle>>>> = score
            .channels
            .iter()
            .map(|c| match c.kind {
                ChannelKind::Audio { .. } => (0..c.pool.len()).map(|_| None).collect(),
                _ => Vec::new(),
            })
            .collect();

        debug!("Preloading {} items for score {}", total, score.id);

        let mut settled_count = 0;
        while let Some((slot, settled)) = pending.next().await {
            settled_count += 1;

            let resolved = match settled {
                Settled::Ready(r) => {
                    report.ready += 1;
                    Some(r)
                }
                Settled::Stalled(r, err) => {
                    warn!("{} (keeping stalled element)", err);
                    report.timed_out += 1;
                    report.errors.push(err);
                    Some(r)
                }
                Settled::Absent(err) => {
                    warn!("{}", err);
                    match err {
                        LoadError::TimedOut { .. } => report.timed_out += 1,
                        LoadError::Failed { .. } => report.failed += 1,
                    }
                    report.errors.push(err);
                    None
                }
            };

            match (slot, resolved) {
                (Slot::Image(i), Some(Resolved::Image(h))) => images[i] = Some(h),
                (Slot::Video(i), Some(Resolved::Video(h))) => videos[i] = Some(h),
                (Slot::Audio { channel, member }, Some(Resolved::Audio(h))) => {
                    audio[channel][member] = Some(h)
                }
                _ => {}
            }

            on_progress(PreloadProgress {
                loaded: settled_count,
                total,
            });
        }

        let table = ResourceTable {
            images: images.into_iter().flatten().collect(),
            videos: videos.into_iter().flatten().collect(),
            audio: audio
                .into_iter()
                .map(|members| members.into_iter().flatten().collect())
                .collect(),
        };

        info!(
            "Preload complete: {} images, {} videos, {} audio elements ({} failed, {} timed out)",
            table.images.len(),
            table.videos.len(),
            table.audio.iter().map(Vec::len).sum::<usize>(),
            report.failed,
            report.timed_out
        );

        (table, report)
    }

    fn image_item(&self, index: usize, url: &str) -> LocalBoxFuture<'static, (Slot, Settled)> {
        let load = self.backend.load_image(url);
        let timeout = self.timeout;
        let url = url.to_string();
        async move {
            let settled = match tokio::time::timeout(timeout, load).await {
                Ok(Ok(image)) => Settled::Ready(Resolved::Image(image)),
                Ok(Err(err)) => Settled::Absent(err),
                Err(_) => Settled::Absent(LoadError::TimedOut { url }),
            };
            (Slot::Image(index), settled)
        }
        .boxed_local()
    }

    fn video_item(&self, index: usize, url: &str) -> LocalBoxFuture<'static, (Slot, Settled)> {
        let load = self.backend.load_video(url);
        let backend = self.backend.clone();
        let timeout = self.timeout;
        let url = url.to_string();
        async move {
            let settled = match tokio::time::timeout(timeout, load).await {
                Ok(Ok(mut video)) => {
                    video.set_looping(true);
                    Settled::Ready(Resolved::Video(video))
                }
                Ok(Err(err)) => Settled::Absent(err),
                Err(_) => {
                    let mut video = backend.create_video();
                    video.set_looping(true);
                    video.set_source(Some(&url));
                    Settled::Stalled(Resolved::Video(video), LoadError::TimedOut { url })
                }
            };
            (Slot::Video(index), settled)
        }
        .boxed_local()
    }

    fn audio_item(
        &self,
        channel: usize,
        member: usize,
        url: &str,
    ) -> LocalBoxFuture<'static, (Slot, Settled)> {
        let load = self.backend.load_audio(url);
        let backend = self.backend.clone();
        let timeout = self.timeout;
        let url = url.to_string();
        async move {
            let settled = match tokio::time::timeout(timeout, load).await {
                Ok(Ok(audio)) => Settled::Ready(Resolved::Audio(audio)),
                Ok(Err(err)) => Settled::Absent(err),
                Err(_) => {
                    let mut audio = backend.create_audio();
                    audio.set_source(Some(&url));
                    Settled::Stalled(Resolved::Audio(audio), LoadError::TimedOut { url })
                }
            };
            (Slot::Audio { channel, member }, settled)
        }
        .boxed_local()
    }
}

/// Whether a (possibly stalled) element can be drawn this frame
pub fn is_drawable<E: MediaElement + ?Sized>(element: &E) -> bool {
    element.ready_state() >= ReadyState::HaveCurrentData
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::headless::{HeadlessBackend, HeadlessConfig};
    use crate::score::{AudioMix, AudioRole, ChannelEvent};
    use uuid::Uuid;

    fn score_with(images: &[&str], videos: &[&str], audio: &[&[&str]]) -> Score {
        let mix = AudioMix {
            gain: 1.0,
            fade_in: 2.0,
            fade_out: 2.0,
            end_offset: 0.0,
        };
        Score {
            id: Uuid::nil(),
            duration: 20.0,
            accel_start: 14.8,
            channels: audio
                .iter()
                .map(|pool| ChannelEvent {
                    kind: ChannelKind::Audio {
                        role: AudioRole::Ambient,
                        mix,
                    },
                    enter_at: 1.0,
                    pool: pool.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
            shared_images: images.iter().map(|s| s.to_string()).collect(),
            shared_videos: videos.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_reported_per_item() {
        let backend = HeadlessBackend::default();
        let preloader = Preloader::new(backend.clone(), Duration::from_secs(15));
        let score = score_with(&["a.png", "b.png"], &["v.mp4"], &[&["x.mp3", "y.mp3"]]);

        let mut progress = Vec::new();
        let (table, report) = preloader
            .preload(&score, |p| progress.push((p.loaded, p.total)))
            .await;

        assert_eq!(progress, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
        assert_eq!(report.ready, 5);
        assert_eq!(table.images.len(), 2);
        assert_eq!(table.videos.len(), 1);
        assert_eq!(table.audio[0].len(), 2);
        assert_eq!(backend.live_elements(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_items_are_absent() {
        let backend = HeadlessBackend::new(
            HeadlessConfig::default()
                .failing("bad.png")
                .failing("bad.mp3"),
        );
        let preloader = Preloader::new(backend.clone(), Duration::from_secs(15));
        let score = score_with(&["bad.png", "ok.png"], &[], &[&["bad.mp3", "ok.mp3"]]);

        let (table, report) = preloader.preload(&score, |_| {}).await;

        assert_eq!(report.failed, 2);
        assert_eq!(table.images.len(), 1);
        assert_eq!(table.images[0].url(), "ok.png");
        assert_eq!(table.audio[0].len(), 1);
        assert_eq!(table.audio[0][0].src().as_deref(), Some("ok.mp3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_lists_each_failure() {
        let backend = HeadlessBackend::new(
            HeadlessConfig::default()
                .failing("bad.png")
                .hanging("slow.mp4"),
        );
        let preloader = Preloader::new(backend, Duration::from_secs(15));
        let score = score_with(&["bad.png", "ok.png"], &["slow.mp4"], &[]);

        let (_, mut report) = preloader.preload(&score, |_| {}).await;
        report.errors.sort_by(|a, b| a.url().cmp(b.url()));

        assert_eq!(
            report,
            PreloadReport {
                total: 3,
                ready: 1,
                failed: 1,
                timed_out: 1,
                errors: vec![
                    LoadError::Failed {
                        url: "bad.png".to_string(),
                        reason: "image decode error".to_string(),
                    },
                    LoadError::TimedOut {
                        url: "slow.mp4".to_string(),
                    },
                ],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_score_resolves_immediately() {
        let preloader = Preloader::new(HeadlessBackend::default(), Duration::from_secs(15));
        let score = score_with(&[], &[], &[]);
        let mut calls = 0;
        let (table, report) = preloader.preload(&score, |_| calls += 1).await;
        assert_eq!(calls, 0);
        assert_eq!(report.total, 0);
        assert_eq!(table.element_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_video_kept_but_not_drawable() {
        let backend = HeadlessBackend::new(HeadlessConfig::default().hanging("slow.mp4"));
        let preloader = Preloader::new(backend.clone(), Duration::from_secs(15));
        let score = score_with(&[], &["slow.mp4"], &[]);

        let (table, report) = preloader.preload(&score, |_| {}).await;

        assert_eq!(report.timed_out, 1);
        assert_eq!(table.videos.len(), 1);
        assert!(!is_drawable(table.videos[0].as_ref()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_all_leaves_no_live_elements() {
        let backend = HeadlessBackend::default();
        let preloader = Preloader::new(backend.clone(), Duration::from_secs(15));
        let score = score_with(&["a.png"], &["v1.mp4", "v2.mp4"], &[&["x.mp3"], &["y.mp3"]]);

        let (mut table, _) = preloader.preload(&score, |_| {}).await;
        assert_eq!(backend.live_elements(), 4);

        table.release_all();
        assert_eq!(backend.live_elements(), 0);
        assert_eq!(table.element_count(), 0);
    }
}

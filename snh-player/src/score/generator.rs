//! Score generation from the materials pool

use super::{AudioMix, AudioRole, ChannelEvent, ChannelKind, Score};
use crate::config::{AudioGroupPreset, CascataPreset, VisualKind};
use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use snh_common::materials::{Material, MediaKind};
use tracing::{info, warn};
use uuid::Uuid;

/// Up to `n` distinct URLs of `kind`, shuffled, from materials carrying one
pub fn pick_random_urls<R: Rng + ?Sized>(
    materials: &[Material],
    kind: MediaKind,
    n: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for url in materials.iter().filter_map(|m| m.url(kind)) {
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls.shuffle(rng);
    urls.truncate(n);
    urls
}

/// Builds cascata scores
#[derive(Debug, Clone)]
pub struct ScoreGenerator {
    preset: CascataPreset,
}

impl ScoreGenerator {
    pub fn new(preset: CascataPreset) -> Self {
        Self { preset }
    }

    pub fn preset(&self) -> &CascataPreset {
        &self.preset
    }

    /// Generate a fresh score
    ///
    /// Channels whose pool comes out empty are left out; a pool with no
    /// usable media at all yields a score with no channels.
    pub fn generate<R: Rng + ?Sized>(&self, materials: &[Material], rng: &mut R) -> Result<Score> {
        let preset = &self.preset;
        let duration = *preset.durations.choose(rng).ok_or_else(|| {
            Error::InvalidConfig("cascata.durations must not be empty".to_string())
        })?;

        let shared_images = pick_random_urls(materials, MediaKind::Image, preset.shared_images, rng);
        let shared_videos = pick_random_urls(materials, MediaKind::Video, preset.shared_videos, rng);

        let mut channels = Vec::new();

        for slot in &preset.visual_schedule {
            let enter_at = duration * slot.at;
            match slot.kind {
                VisualKind::Image if !shared_images.is_empty() => channels.push(ChannelEvent {
                    kind: ChannelKind::Image(preset.overlay),
                    enter_at,
                    pool: shared_images.clone(),
                }),
                VisualKind::Video if !shared_videos.is_empty() => channels.push(ChannelEvent {
                    kind: ChannelKind::Video(preset.overlay),
                    enter_at,
                    pool: shared_videos.clone(),
                }),
                _ => {}
            }
        }

        let ambient = self.audio_channels(
            materials,
            MediaKind::AmbientAudio,
            AudioRole::Ambient,
            &preset.ambient,
            duration,
            rng,
        );
        let spectral = self.audio_channels(
            materials,
            MediaKind::SpectralAudio,
            AudioRole::Spectral,
            &preset.spectral,
            duration,
            rng,
        );
        let ambient_count = ambient.len();
        let spectral_count = spectral.len();
        channels.extend(ambient);
        channels.extend(spectral);

        // Stable: ties keep visual → ambient → spectral order
        channels.sort_by(|a, b| a.enter_at.total_cmp(&b.enter_at));

        let score = Score {
            id: Uuid::new_v4(),
            duration,
            accel_start: duration * preset.accel_phase,
            channels,
            shared_images,
            shared_videos,
        };

        info!(
            "Score {}: {}s, {} channels, {} images, {} videos, {} ambient ch, {} spectral ch",
            score.id,
            score.duration,
            score.channels.len(),
            score.shared_images.len(),
            score.shared_videos.len(),
            ambient_count,
            spectral_count
        );

        Ok(score)
    }

    fn audio_channels<R: Rng + ?Sized>(
        &self,
        materials: &[Material],
        kind: MediaKind,
        role: AudioRole,
        group: &AudioGroupPreset,
        duration: f64,
        rng: &mut R,
    ) -> Vec<ChannelEvent> {
        let total = group.entries.len() * group.per_channel;
        let urls = pick_random_urls(materials, kind, total, rng);
        let mix = AudioMix {
            gain: group.gain,
            fade_in: group.fade_in,
            fade_out: group.fade_out,
            end_offset: group.end_offset,
        };

        group
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let start = i * group.per_channel;
                if start >= urls.len() {
                    return None;
                }
                let end = (start + group.per_channel).min(urls.len());
                let enter_at = entry.resolve(duration);
                if !(0.0..duration).contains(&enter_at) {
                    warn!(
                        "{:?} channel entry {:?} outside a {}s score, skipped",
                        role, entry, duration
                    );
                    return None;
                }
                Some(ChannelEvent {
                    kind: ChannelKind::Audio { role, mix },
                    enter_at,
                    pool: urls[start..end].to_vec(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use snh_common::events::ChannelTag;

    fn full_pool(n: usize) -> Vec<Material> {
        (0..n)
            .map(|i| {
                Material::new(format!("m{}", i))
                    .with_url(MediaKind::Image, format!("img{}.png", i))
                    .with_url(MediaKind::Video, format!("vid{}.mp4", i))
                    .with_url(MediaKind::AmbientAudio, format!("amb{}.mp3", i))
                    .with_url(MediaKind::SpectralAudio, format!("spec{}.mp3", i))
            })
            .collect()
    }

    #[test]
    fn test_enter_at_within_duration_for_many_scores() {
        let generator = ScoreGenerator::new(CascataPreset::default());
        let materials = full_pool(30);
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let score = generator.generate(&materials, &mut rng).unwrap();
            assert!(CascataPreset::default().durations.contains(&score.duration));
            let mut last = 0.0;
            for channel in &score.channels {
                assert!(channel.enter_at >= 0.0);
                assert!(channel.enter_at < score.duration);
                assert!(channel.enter_at >= last);
                last = channel.enter_at;
            }
        }
    }

    #[test]
    fn test_full_pool_channel_counts() {
        let generator = ScoreGenerator::new(CascataPreset::default());
        let mut rng = StdRng::seed_from_u64(1);
        let score = generator.generate(&full_pool(30), &mut rng).unwrap();

        assert_eq!(score.count(ChannelTag::Image), 4);
        assert_eq!(score.count(ChannelTag::Video), 3);
        assert_eq!(score.count(ChannelTag::AmbientAudio), 5);
        assert_eq!(score.count(ChannelTag::SpectralAudio), 3);
        assert_eq!(score.shared_images.len(), 10);
        assert_eq!(score.shared_videos.len(), 4);
        assert!((score.accel_start - score.duration * 0.74).abs() < 1e-9);
        // 10 images + 4 videos + 5x2 ambient + 3x2 spectral
        assert_eq!(score.resource_count(), 30);
    }

    #[test]
    fn test_spectral_channels_enter_at_fixed_seconds() {
        let generator = ScoreGenerator::new(CascataPreset::default());
        let mut rng = StdRng::seed_from_u64(9);
        let score = generator.generate(&full_pool(30), &mut rng).unwrap();
        let entries: Vec<f64> = score
            .channels
            .iter()
            .filter(|c| c.kind.tag() == ChannelTag::SpectralAudio)
            .map(|c| c.enter_at)
            .collect();
        assert_eq!(entries, vec![5.0, 12.0, 18.0]);
    }

    #[test]
    fn test_empty_pools_omit_channels() {
        let generator = ScoreGenerator::new(CascataPreset::default());
        let mut rng = StdRng::seed_from_u64(3);
        let images_only: Vec<Material> = (0..5)
            .map(|i| Material::new(format!("m{}", i)).with_url(MediaKind::Image, format!("{}.png", i)))
            .collect();

        let score = generator.generate(&images_only, &mut rng).unwrap();
        assert!(score
            .channels
            .iter()
            .all(|c| c.kind.tag() == ChannelTag::Image));
        assert_eq!(score.count(ChannelTag::Image), 4);

        let empty = generator.generate(&[], &mut rng).unwrap();
        assert!(empty.channels.is_empty());
        assert_eq!(empty.resource_count(), 0);
    }

    #[test]
    fn test_short_audio_pool_fills_leading_channels() {
        let generator = ScoreGenerator::new(CascataPreset::default());
        let mut rng = StdRng::seed_from_u64(5);
        // 3 ambient clips: channel 0 gets 2, channel 1 gets 1, rest omitted
        let materials: Vec<Material> = (0..3)
            .map(|i| {
                Material::new(format!("m{}", i))
                    .with_url(MediaKind::AmbientAudio, format!("a{}.mp3", i))
            })
            .collect();
        let score = generator.generate(&materials, &mut rng).unwrap();
        let pools: Vec<usize> = score.channels.iter().map(|c| c.pool.len()).collect();
        assert_eq!(pools, vec![2, 1]);
    }

    #[test]
    fn test_audio_pools_are_distinct() {
        let generator = ScoreGenerator::new(CascataPreset::default());
        let mut rng = StdRng::seed_from_u64(11);
        let score = generator.generate(&full_pool(30), &mut rng).unwrap();
        let mut seen = std::collections::HashSet::new();
        for channel in score.channels.iter().filter(|c| !c.kind.is_visual()) {
            for url in &channel.pool {
                assert!(seen.insert(url.clone()), "{} drawn twice", url);
            }
        }
    }

    #[test]
    fn test_pick_random_urls_dedupes() {
        let mut rng = StdRng::seed_from_u64(0);
        let materials = vec![
            Material::new("a").with_url(MediaKind::Video, "same.mp4"),
            Material::new("b").with_url(MediaKind::Video, "same.mp4"),
            Material::new("c").with_url(MediaKind::Video, "other.mp4"),
        ];
        let mut urls = pick_random_urls(&materials, MediaKind::Video, 10, &mut rng);
        urls.sort();
        assert_eq!(urls, vec!["other.mp4", "same.mp4"]);
    }
}

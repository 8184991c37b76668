//! Candidate file validation.
//!
//! Files are checked one by one in input order:
//!
//! 1. media type must be allowed, otherwise the file is rejected and the batch continues
//! 2. size must not exceed the maximum, otherwise the file is rejected and the batch continues
//! 3. once the gallery would be full, the file and every later file of the
//!    batch are rejected with a capacity error and not inspected further
//!
//! Accepted files get a preview and come back as pending entries, in input
//! order. Each rejected file produces one notification; a batch with at least
//! one accepted file also produces one summary notification.

use serde::Serialize;

use crate::config::GalleryConfig;
use crate::error::FileRejection;
use crate::models::{CandidateFile, ImageEntry};
use crate::notify::Notifier;
use crate::preview::PreviewRegistry;

/// Result of validating one batch.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    /// Pending entries ready to append, in input order
    pub accepted: Vec<ImageEntry>,
    /// One rejection per refused file, in input order
    pub rejected: Vec<FileRejection>,
}

impl ValidationOutcome {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            accepted: self.accepted.len(),
            rejected: self
                .rejected
                .iter()
                .map(|r| RejectedFile {
                    name: r.file_name().to_string(),
                    reason: r.to_string(),
                })
                .collect(),
        }
    }
}

/// Serializable outcome for clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub accepted: usize,
    pub rejected: Vec<RejectedFile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedFile {
    pub name: String,
    pub reason: String,
}

/// Type and size checks for one file. Capacity is checked by the batch.
pub fn check_file(file: &CandidateFile, config: &GalleryConfig) -> Result<(), FileRejection> {
    if !config.is_allowed_type(&file.media_type) {
        return Err(FileRejection::UnsupportedType {
            name: file.name.clone(),
            media_type: file.media_type.clone(),
        });
    }
    if file.size() > config.max_file_size {
        return Err(FileRejection::TooLarge {
            name: file.name.clone(),
            size: file.size(),
            max_mib: config.max_file_size_mib(),
        });
    }
    Ok(())
}

/// Validate a batch against a staging list that already holds `current_count` entries.
pub fn validate_candidates(
    files: Vec<CandidateFile>,
    current_count: usize,
    config: &GalleryConfig,
    previews: &PreviewRegistry,
    notifier: &Notifier,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    let mut full = false;

    for file in files {
        if full {
            outcome.rejected.push(FileRejection::CapacityReached {
                name: file.name,
                max: config.max_images,
            });
            continue;
        }

        if let Err(rejection) = check_file(&file, config) {
            outcome.rejected.push(rejection);
            continue;
        }

        if current_count + outcome.accepted.len() >= config.max_images {
            full = true;
            outcome.rejected.push(FileRejection::CapacityReached {
                name: file.name,
                max: config.max_images,
            });
            continue;
        }

        let preview = previews.create(&file);
        outcome.accepted.push(ImageEntry::Local { file, preview });
    }

    for rejection in &outcome.rejected {
        notifier.error(rejection.to_string());
    }
    if !outcome.accepted.is_empty() {
        notifier.success(format!(
            "{} photo(s) ready to upload",
            outcome.accepted.len()
        ));
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{drain, NotificationLevel};

    fn jpeg(name: &str, size: usize) -> CandidateFile {
        CandidateFile::new(name, "image/jpeg", vec![0u8; size])
    }

    fn small_config(max_images: usize, max_file_size: u64) -> GalleryConfig {
        GalleryConfig {
            max_images,
            max_file_size,
            ..GalleryConfig::default()
        }
    }

    fn names(outcome: &ValidationOutcome) -> Vec<String> {
        outcome
            .accepted
            .iter()
            .map(|e| e.file().unwrap().name.clone())
            .collect()
    }

    #[test]
    fn test_accepts_valid_files_in_order() {
        let config = GalleryConfig::default();
        let previews = PreviewRegistry::new();
        let notifier = Notifier::new(16);
        let mut rx = notifier.subscribe();

        let files = vec![
            jpeg("a.jpg", 10),
            CandidateFile::new("b.png", "image/png", vec![0u8; 10]),
            CandidateFile::new("c.webp", "image/webp", vec![0u8; 10]),
        ];
        let outcome = validate_candidates(files, 0, &config, &previews, &notifier);

        assert_eq!(names(&outcome), vec!["a.jpg", "b.png", "c.webp"]);
        assert!(outcome.rejected.is_empty());
        assert_eq!(previews.live_count(), 3);

        let entries = drain(&mut rx);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, NotificationLevel::Success);
        assert_eq!(entries[0].message, "3 photo(s) ready to upload");
    }

    #[test]
    fn test_wrong_type_rejected_without_staging() {
        let config = GalleryConfig::default();
        let previews = PreviewRegistry::new();
        let notifier = Notifier::new(16);
        let mut rx = notifier.subscribe();

        let files = vec![CandidateFile::new("b.gif", "image/gif", vec![0u8; 1024 * 1024])];
        let outcome = validate_candidates(files, 0, &config, &previews, &notifier);

        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
        assert!(matches!(outcome.rejected[0], FileRejection::UnsupportedType { .. }));
        assert_eq!(previews.live_count(), 0);

        let entries = drain(&mut rx);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, NotificationLevel::Error);
        assert!(entries[0].message.contains("b.gif"));
    }

    #[test]
    fn test_oversized_file_rejected_and_batch_continues() {
        let config = small_config(7, 100);
        let previews = PreviewRegistry::new();
        let notifier = Notifier::new(16);

        let files = vec![jpeg("big.jpg", 101), jpeg("ok.jpg", 100)];
        let outcome = validate_candidates(files, 0, &config, &previews, &notifier);

        assert_eq!(names(&outcome), vec!["ok.jpg"]);
        assert!(matches!(
            &outcome.rejected[0],
            FileRejection::TooLarge { name, size: 101, .. } if name == "big.jpg"
        ));
    }

    #[test]
    fn test_full_gallery_rejects_new_file() {
        let config = GalleryConfig::default();
        let previews = PreviewRegistry::new();
        let notifier = Notifier::new(16);
        let mut rx = notifier.subscribe();

        let outcome = validate_candidates(vec![jpeg("late.jpg", 10)], 7, &config, &previews, &notifier);

        assert!(outcome.accepted.is_empty());
        assert_eq!(
            outcome.rejected,
            vec![FileRejection::CapacityReached { name: "late.jpg".into(), max: 7 }]
        );
        let entries = drain(&mut rx);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("up to 7 images"));
    }

    #[test]
    fn test_capacity_stops_rest_of_batch() {
        let config = small_config(3, 1000);
        let previews = PreviewRegistry::new();
        let notifier = Notifier::new(16);

        let files = vec![
            jpeg("1.jpg", 10),
            jpeg("2.jpg", 10),
            jpeg("3.jpg", 10),
            // Would fail the type check, but the batch already stopped
            CandidateFile::new("4.gif", "image/gif", vec![0u8; 10]),
        ];
        let outcome = validate_candidates(files, 1, &config, &previews, &notifier);

        assert_eq!(names(&outcome), vec!["1.jpg", "2.jpg"]);
        assert_eq!(outcome.rejected.len(), 2);
        assert!(outcome
            .rejected
            .iter()
            .all(|r| matches!(r, FileRejection::CapacityReached { .. })));
    }

    #[test]
    fn test_every_file_accounted_for_once() {
        let config = small_config(4, 50);
        let previews = PreviewRegistry::new();
        let notifier = Notifier::new(64);

        for current in 0..=4 {
            let mut rx = notifier.subscribe();
            let files = vec![
                jpeg("a.jpg", 10),
                CandidateFile::new("b.bmp", "image/bmp", vec![0u8; 10]),
                jpeg("c.jpg", 80),
                jpeg("d.jpg", 10),
                jpeg("e.jpg", 10),
                jpeg("f.jpg", 10),
            ];
            let batch = files.len();
            let outcome = validate_candidates(files, current, &config, &previews, &notifier);

            assert_eq!(outcome.accepted.len() + outcome.rejected.len(), batch);
            assert!(current + outcome.accepted.len() <= config.max_images);

            let rejections = drain(&mut rx)
                .into_iter()
                .filter(|n| n.level == NotificationLevel::Error)
                .count();
            assert_eq!(outcome.accepted.len() + rejections, batch);
        }
    }

    #[test]
    fn test_no_summary_when_nothing_accepted() {
        let config = GalleryConfig::default();
        let previews = PreviewRegistry::new();
        let notifier = Notifier::new(16);
        let mut rx = notifier.subscribe();

        let outcome = validate_candidates(Vec::new(), 0, &config, &previews, &notifier);
        assert!(outcome.accepted.is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_summary_serializes_reasons() {
        let config = GalleryConfig::default();
        let previews = PreviewRegistry::new();
        let notifier = Notifier::new(16);
        let files = vec![CandidateFile::new("x.tiff", "image/tiff", vec![1u8])];
        let summary = validate_candidates(files, 0, &config, &previews, &notifier).summary();

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["accepted"], 0);
        assert_eq!(json["rejected"][0]["name"], "x.tiff");
        assert_eq!(json["rejected"][0]["reason"], "x.tiff is not a supported image format");
    }
}

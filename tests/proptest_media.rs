use proptest::prelude::*;
use reddit_media_relay::config::MEDIA_GROUP_MAX_ITEMS;
use reddit_media_relay::link::{canonicalize_link, extract_link};
use reddit_media_relay::media::{batches, ClassifiedFile, ClassifiedMedia, MediaKind, PlannedSend, UploadPlan};
use std::path::PathBuf;

fn files(kind: MediaKind, n: usize) -> Vec<ClassifiedFile> {
    (0..n)
        .map(|i| ClassifiedFile {
            path: PathBuf::from(format!("f{i:04}")),
            size: 1,
            kind,
        })
        .collect()
}

proptest! {
    /// N files become ceil(N / 10) batches, none empty or over the limit.
    #[test]
    fn batch_count_is_ceiling(n in 0_usize..200) {
        let result = batches(MediaKind::Image, files(MediaKind::Image, n));

        prop_assert_eq!(result.len(), n.div_ceil(MEDIA_GROUP_MAX_ITEMS));
        for batch in &result {
            prop_assert!(!batch.is_empty());
            prop_assert!(batch.len() <= MEDIA_GROUP_MAX_ITEMS);
        }
    }

    /// Concatenating the batches gives back the input in order.
    #[test]
    fn batches_are_contiguous(n in 0_usize..200) {
        let input = files(MediaKind::Video, n);
        let flattened: Vec<ClassifiedFile> = batches(MediaKind::Video, input.clone())
            .iter()
            .flat_map(|b| b.files().to_vec())
            .collect();

        prop_assert_eq!(flattened, input);
    }

    /// Files above the ceiling never reach an upload bucket.
    #[test]
    fn classification_respects_size_ceiling(
        entries in proptest::collection::vec(("(jpg|png|pdf|mp4|webm|gif|json|txt)", 0_u64..2_000), 0..50),
        max_size in 0_u64..2_000,
    ) {
        let mut media = ClassifiedMedia::default();
        for (i, (ext, size)) in entries.iter().enumerate() {
            media.push(PathBuf::from(format!("{i}.{ext}")), *size, max_size);
        }

        let too_big = entries.iter().filter(|(_, size)| *size > max_size).count();
        prop_assert_eq!(media.oversized.len(), too_big);
        prop_assert_eq!(media.uploadable_count(), entries.len() - too_big);

        for file in media.images.iter().chain(&media.videos).chain(&media.documents).chain(&media.animations) {
            prop_assert!(file.size <= max_size);
            prop_assert_eq!(MediaKind::from_path(&file.path), file.kind);
        }
    }

    /// Sends come out as images, videos, documents, then single animations.
    #[test]
    fn plan_orders_kinds(
        images in 0_usize..25,
        videos in 0_usize..25,
        documents in 0_usize..25,
        animations in 0_usize..5,
    ) {
        let media = ClassifiedMedia {
            images: files(MediaKind::Image, images),
            videos: files(MediaKind::Video, videos),
            documents: files(MediaKind::Document, documents),
            animations: files(MediaKind::Animation, animations),
            oversized: Vec::new(),
        };
        let plan = UploadPlan::from(media);

        let rank = |kind: MediaKind| match kind {
            MediaKind::Image => 0,
            MediaKind::Video => 1,
            MediaKind::Document => 2,
            MediaKind::Animation => 3,
        };
        let ranks: Vec<u8> = plan.sends().iter().map(|s| rank(s.kind())).collect();
        prop_assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(plan.file_count(), images + videos + documents + animations);

        let single_animations = plan
            .sends()
            .iter()
            .filter(|s| matches!(s, PlannedSend::Animation(_)))
            .count();
        prop_assert_eq!(single_animations, animations);
    }

    /// Canonicalization is idempotent on extracted links.
    #[test]
    fn canonicalize_is_idempotent(
        path in "[a-z0-9_]{1,12}/comments/[a-z0-9]{1,8}",
        query in "(\\?[a-z]{1,5}=[a-z0-9]{1,5})?",
    ) {
        let text = format!("look https://www.reddit.com/r/{path}{query} please");
        let link = extract_link(&text);
        prop_assert!(link.is_some());
        let once = canonicalize_link(link.unwrap_or_default());
        prop_assert!(!once.contains('?'));
        prop_assert_eq!(canonicalize_link(&once), once.clone());
    }
}

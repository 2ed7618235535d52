use std::collections::BTreeMap;
use std::ops::ControlFlow;

use tracing::{error, info};

use crate::collaborator::ImageRenderer;
use crate::gemini::preview;
use crate::models::AspectRatio;

/// Shown once when rendering stops early.
pub const RENDER_FALLBACK_NOTICE: &str =
    "Quota Nano Banana Pro tạm hết hoặc có lỗi, bạn copy prompt sang Gemini chat để tạo ảnh nhé!";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    pub images: BTreeMap<usize, String>,
    pub notice: Option<String>,
}

/// Renders one image per prompt, strictly in index order.
///
/// Indices already present in `images` are skipped, so calling again after a
/// failure resumes at the first missing prompt. The first failure stops the
/// batch; everything obtained before it is kept. `on_image` sees each new
/// image as soon as it arrives and breaks the loop when nobody wants the
/// rest, in which case no further request is issued.
pub async fn realize_images(
    renderer: &dyn ImageRenderer,
    prompts: &[String],
    aspect_ratio: AspectRatio,
    mut images: BTreeMap<usize, String>,
    mut on_image: impl FnMut(usize, &str) -> ControlFlow<()> + Send,
) -> RenderReport {
    for (index, prompt) in prompts.iter().enumerate() {
        if images.contains_key(&index) {
            continue;
        }
        info!("🎨 Rendering image {}/{}", index + 1, prompts.len());
        match renderer.render_image(prompt, aspect_ratio).await {
            Ok(image) => {
                info!("✅ Image {} ready: {}", index + 1, preview(&image, 50));
                let flow = on_image(index, &image);
                images.insert(index, image);
                if flow.is_break() {
                    info!("⏹️ Rendering abandoned after image {}", index + 1);
                    break;
                }
            }
            Err(e) => {
                error!("❌ Image {} failed, stopping batch: {}", index + 1, e);
                return RenderReport { images, notice: Some(RENDER_FALLBACK_NOTICE.to_string()) };
            }
        }
    }
    RenderReport { images, notice: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::mock::MockStudio;

    fn prompts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("prompt {i}")).collect()
    }

    #[tokio::test]
    async fn stops_at_first_failure_and_keeps_earlier_images() {
        let studio = MockStudio { fail_render_at: Some(2), ..Default::default() };
        let mut seen = Vec::new();
        let report = realize_images(&studio, &prompts(5), AspectRatio::Portrait, BTreeMap::new(), |i, _| {
            seen.push(i);
            ControlFlow::Continue(())
        })
        .await;

        assert_eq!(report.images.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(report.notice.as_deref(), Some(RENDER_FALLBACK_NOTICE));
        assert_eq!(studio.count("render_image"), 3, "indices 3 and 4 must never be requested");
        assert_eq!(seen, vec![0, 1]);
    }

    #[tokio::test]
    async fn resumes_by_skipping_existing_indices() {
        let studio = MockStudio::default();
        let existing = BTreeMap::from([(0, "old0".to_string()), (2, "old2".to_string())]);
        let report = realize_images(&studio, &prompts(4), AspectRatio::Landscape, existing, |_, _| ControlFlow::Continue(())).await;

        assert_eq!(report.notice, None);
        assert_eq!(report.images.len(), 4);
        assert_eq!(report.images[&0], "old0");
        assert_eq!(report.images[&2], "old2");
        assert_eq!(studio.count("render_image"), 2);
        assert!(studio.calls().iter().all(|c| c.starts_with("render_image:16:9")));
    }

    #[tokio::test]
    async fn nothing_to_do_when_all_rendered() {
        let studio = MockStudio::default();
        let existing = BTreeMap::from([(0, "a".to_string())]);
        let report = realize_images(&studio, &prompts(1), AspectRatio::Portrait, existing.clone(), |_, _| ControlFlow::Continue(())).await;
        assert_eq!(report, RenderReport { images: existing, notice: None });
        assert!(studio.calls().is_empty());
    }

    #[tokio::test]
    async fn break_from_callback_stops_further_requests() {
        let studio = MockStudio::default();
        let report = realize_images(&studio, &prompts(5), AspectRatio::Portrait, BTreeMap::new(), |index, _| {
            if index == 1 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
        })
        .await;

        assert_eq!(studio.count("render_image"), 2);
        assert_eq!(report.images.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(report.notice, None);
    }
}

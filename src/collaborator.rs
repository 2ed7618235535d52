//! Capabilities the pipeline consumes from the generative-AI service.

use async_trait::async_trait;
use bytes::Bytes;

use crate::gemini::GeminiError;
use crate::models::{AspectRatio, ContentStyle, VisualMeta};

#[async_trait]
pub trait ContentService: Send + Sync {
    /// Reads the calligraphy/caption text out of an uploaded image.
    async fn extract_text(&self, image: Bytes) -> Result<String, GeminiError>;

    /// Writes `count` delimiter-separated variants about `topic`.
    async fn generate_content(&self, topic: &str, count: usize, style: ContentStyle) -> Result<String, GeminiError>;

    /// Rewrites short content into `target` delimiter-separated variants.
    async fn expand_content(&self, original: &str, target: usize) -> Result<String, GeminiError>;

    /// Never fails: implementations substitute a fallback on any error.
    async fn infer_visual_meta(&self, segment: &str, subject_hint: Option<&str>, tone_hint: Option<&str>) -> VisualMeta;
}

#[async_trait]
pub trait ImageRenderer: Send + Sync {
    /// Returns the rendered image as a `data:` URL.
    async fn render_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<String, GeminiError>;
}

/// Metadata for a blank segment; assigned locally without calling the service.
pub fn abstract_meta() -> VisualMeta {
    VisualMeta {
        subject: "Trừu tượng".into(),
        context: "Mờ ảo".into(),
        tone: "Tĩnh lặng".into(),
        symbol: "Hư không".into(),
    }
}

/// Metadata used when the inference call itself failed.
pub fn contemplative_meta(subject_hint: Option<&str>, tone_hint: Option<&str>) -> VisualMeta {
    VisualMeta {
        subject: subject_hint.unwrap_or("Cành trúc hoặc hoa sen tối giản").to_string(),
        context: "Nền giấy cũ kỹ".into(),
        tone: tone_hint.unwrap_or("Hoài cổ, suy tư").to_string(),
        symbol: "Vẻ đẹp của sự giản đơn".into(),
    }
}

/// Metadata used when the service answered without any content.
pub fn minimalist_meta(subject_hint: Option<&str>, tone_hint: Option<&str>) -> VisualMeta {
    VisualMeta {
        subject: subject_hint.unwrap_or("Hình ảnh trừu tượng tối giản").to_string(),
        context: "Không gian mờ ảo sương khói".into(),
        tone: tone_hint.unwrap_or("Trầm lắng, đơn sắc").to_string(),
        symbol: "Sự tĩnh lặng của tâm hồn".into(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallbacks_respect_hints() {
        let meta = contemplative_meta(Some("Cá chép"), None);
        assert_eq!(meta.subject, "Cá chép");
        assert_eq!(meta.tone, "Hoài cổ, suy tư");
        assert_eq!(meta.context, "Nền giấy cũ kỹ");

        let meta = minimalist_meta(None, Some("Tím mộng mơ"));
        assert_eq!(meta.subject, "Hình ảnh trừu tượng tối giản");
        assert_eq!(meta.tone, "Tím mộng mơ");
    }

    #[test]
    fn abstract_meta_is_fixed() {
        assert_eq!(abstract_meta(), abstract_meta());
        assert_eq!(abstract_meta().symbol, "Hư không");
    }
}

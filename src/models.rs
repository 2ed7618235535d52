use serde::{Serialize, Deserialize};
use serde_with::skip_serializing_none;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::workflow::Workflow;

/// Signature written beside the artwork when the user leaves it blank.
pub const DEFAULT_SIGNATURE: &str = "Minh Đỗ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 2] = [AspectRatio::Portrait, AspectRatio::Landscape];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypographyStyle {
    #[default]
    ClassicCalligraphy,
    ModernCalligraphy,
    HandDrawn,
    Handwriting,
    Woodcut,
    HanNom,
    Other,
}

impl TypographyStyle {
    pub const ALL: [TypographyStyle; 7] = [
        TypographyStyle::ClassicCalligraphy,
        TypographyStyle::ModernCalligraphy,
        TypographyStyle::HandDrawn,
        TypographyStyle::Handwriting,
        TypographyStyle::Woodcut,
        TypographyStyle::HanNom,
        TypographyStyle::Other,
    ];

    /// Canonical name quoted into prompts.
    pub fn label(&self) -> &'static str {
        match self {
            TypographyStyle::ClassicCalligraphy => "Thư pháp cổ điển",
            TypographyStyle::ModernCalligraphy => "Thư pháp hiện đại",
            TypographyStyle::HandDrawn => "Hand-drawn / Sketch",
            TypographyStyle::Handwriting => "Chữ viết tay thường",
            TypographyStyle::Woodcut => "Khắc gỗ",
            TypographyStyle::HanNom => "Hán Nôm cổ điển",
            TypographyStyle::Other => "Khác",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundStyle {
    #[default]
    InkWash,
    DongHoFolk,
    Lacquer,
    Silk,
    BatTrangCeramic,
    BacklitBambooPaper,
    MistyGioPaper,
    AgedDoPaper,
    Sumie,
    DriedLotusLeaf,
    Sketchbook,
    RusticWood,
    ModernMinimal,
    Other,
}

impl BackgroundStyle {
    pub const ALL: [BackgroundStyle; 14] = [
        BackgroundStyle::InkWash,
        BackgroundStyle::DongHoFolk,
        BackgroundStyle::Lacquer,
        BackgroundStyle::Silk,
        BackgroundStyle::BatTrangCeramic,
        BackgroundStyle::BacklitBambooPaper,
        BackgroundStyle::MistyGioPaper,
        BackgroundStyle::AgedDoPaper,
        BackgroundStyle::Sumie,
        BackgroundStyle::DriedLotusLeaf,
        BackgroundStyle::Sketchbook,
        BackgroundStyle::RusticWood,
        BackgroundStyle::ModernMinimal,
        BackgroundStyle::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BackgroundStyle::InkWash => "Thủy mặc truyền thống",
            BackgroundStyle::DongHoFolk => "Tranh dân gian Đông Hồ",
            BackgroundStyle::Lacquer => "Sơn mài truyền thống",
            BackgroundStyle::Silk => "Lụa tơ tằm",
            BackgroundStyle::BatTrangCeramic => "Gốm sứ Bát Tràng",
            BackgroundStyle::BacklitBambooPaper => "Giấy trúc chỉ xuyên sáng",
            BackgroundStyle::MistyGioPaper => "Giấy gió mờ ảo",
            BackgroundStyle::AgedDoPaper => "Giấy dó cổ vàng",
            BackgroundStyle::Sumie => "Sumie Nhật Bản",
            BackgroundStyle::DriedLotusLeaf => "Lá sen khô",
            BackgroundStyle::Sketchbook => "Sketchbook giấy dày",
            BackgroundStyle::RusticWood => "Gỗ cũ mộc mạc",
            BackgroundStyle::ModernMinimal => "Tối giản hiện đại",
            BackgroundStyle::Other => "Khác",
        }
    }
}

/// Form of the content synthesized from a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStyle {
    Prose,
    #[default]
    #[serde(alias = "poetry")]
    Verse,
}

impl ContentStyle {
    pub const ALL: [ContentStyle; 2] = [ContentStyle::Prose, ContentStyle::Verse];

    pub fn label(&self) -> &'static str {
        match self {
            ContentStyle::Prose => "Văn xuôi",
            ContentStyle::Verse => "Thơ / Câu đối",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    Text,
    Image,
    Idea,
}

/// Number of prompts requested for one run, always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct TargetCount(usize);

impl TargetCount {
    pub const MIN: usize = 1;
    pub const MAX: usize = 5;

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for TargetCount {
    fn default() -> Self {
        TargetCount(3)
    }
}

impl TryFrom<usize> for TargetCount {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(TargetCount(value))
        } else {
            Err(format!("count must be between {} and {}, got {}", Self::MIN, Self::MAX, value))
        }
    }
}

impl From<TargetCount> for usize {
    fn from(count: TargetCount) -> usize {
        count.0
    }
}

/// Input-side selections that survive a workflow reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub input_mode: InputMode,
    pub count: TargetCount,
    pub smart_split: bool,
    pub content_style: ContentStyle,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            input_mode: InputMode::Text,
            count: TargetCount::default(),
            smart_split: true,
            content_style: ContentStyle::Verse,
        }
    }
}

/// Visual and typographic parameters. A clone taken at confirm time is the
/// snapshot every prompt of that run is built from.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub aspect_ratio: AspectRatio,
    pub typography: TypographyStyle,
    pub custom_typography: Option<String>,
    pub background: BackgroundStyle,
    pub custom_background: Option<String>,
    pub signature: String,
    pub subject: Option<String>,
    pub tone: Option<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Portrait,
            typography: TypographyStyle::ClassicCalligraphy,
            custom_typography: None,
            background: BackgroundStyle::InkWash,
            custom_background: None,
            signature: DEFAULT_SIGNATURE.to_string(),
            subject: None,
            tone: None,
        }
    }
}

impl StyleConfig {
    pub fn subject_override(&self) -> Option<&str> {
        non_blank(self.subject.as_deref())
    }

    pub fn tone_override(&self) -> Option<&str> {
        non_blank(self.tone.as_deref())
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualMeta {
    pub subject: String,
    pub context: String,
    pub tone: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub settings: RunSettings,
    pub style: StyleConfig,
    pub workflow: Workflow,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(settings: RunSettings, style: StyleConfig) -> Self {
        let now = Utc::now();
        Self { id: Uuid::new_v4(), settings, style, workflow: Workflow::default(), created_at: now, updated_at: now }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// --- Request bodies ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub settings: Option<RunSettings>,
    #[serde(default)]
    pub style: Option<StyleConfig>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub text: Option<String>,
    /// Data URL or bare base64 payload of the uploaded image.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub custom_topic: Option<String>,
    #[serde(default)]
    pub settings: Option<RunSettings>,
    #[serde(default)]
    pub style: Option<StyleConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthChoice {
    Expand,
    Reduce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthDecisionRequest {
    pub choice: LengthChoice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentsRequest {
    pub segments: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub segments: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_count_rejects_out_of_range() {
        assert!(TargetCount::try_from(0).is_err());
        assert!(TargetCount::try_from(6).is_err());
        assert_eq!(TargetCount::try_from(5).map(|c| c.get()), Ok(5));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: RunSettings = serde_json::from_str(r#"{"input_mode":"idea","count":2}"#).unwrap();
        assert_eq!(settings.input_mode, InputMode::Idea);
        assert_eq!(settings.count.get(), 2);
        assert!(settings.smart_split);

        let invalid = serde_json::from_str::<RunSettings>(r#"{"count":9}"#);
        assert!(invalid.is_err());
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let style = StyleConfig { subject: Some("   ".into()), tone: Some("Đỏ rực".into()), ..Default::default() };
        assert_eq!(style.subject_override(), None);
        assert_eq!(style.tone_override(), Some("Đỏ rực"));
    }

    #[test]
    fn aspect_ratio_uses_ratio_strings() {
        let json = serde_json::to_string(&AspectRatio::Landscape).unwrap();
        assert_eq!(json, "\"16:9\"");
        let parsed: AspectRatio = serde_json::from_str("\"9:16\"").unwrap();
        assert_eq!(parsed, AspectRatio::Portrait);
    }
}

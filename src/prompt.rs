use crate::catalog::{background_description, orientation_for};
use crate::models::{non_blank, BackgroundStyle, StyleConfig, TypographyStyle, VisualMeta, DEFAULT_SIGNATURE};

/// Closing colour line used when neither the user nor the metadata gives a tone.
const FALLBACK_TONE: &str = "đơn sắc hoặc gần đơn sắc";

/// Builds the final image prompt for one segment.
///
/// Deterministic: the same segment, style and metadata always produce the
/// same string. User subject/tone overrides win over inferred metadata;
/// context and symbol always come from the metadata.
pub fn assemble(segment: &str, style: &StyleConfig, meta: &VisualMeta) -> String {
    let orientation = orientation_for(style.aspect_ratio.as_str());
    let signature = non_blank(Some(style.signature.as_str())).unwrap_or(DEFAULT_SIGNATURE);

    let typography = match style.typography {
        TypographyStyle::Other => style.custom_typography.as_deref().unwrap_or_default(),
        canonical => canonical.label(),
    };

    let (background, detail_block) = match style.background {
        BackgroundStyle::Other => (style.custom_background.as_deref().unwrap_or_default(), String::new()),
        canonical => {
            let block = background_description(canonical)
                .map(|desc| format!("<<MÔ TẢ CHI TIẾT NỀN & HÌNH>>\n- {}: {}", canonical.label(), desc))
                .unwrap_or_default();
            (canonical.label(), block)
        }
    };

    let subject = style.subject_override().unwrap_or(meta.subject.as_str());
    let tone = style.tone_override().unwrap_or(meta.tone.as_str());
    let closing_tone = if tone.trim().is_empty() { FALLBACK_TONE } else { tone };

    format!(
        "[Tạo một bức tranh infographic định dạng {orientation}, nghệ thuật cao cấp dành cho người lớn, không khí trầm lắng, sâu sắc, suy tư.

Kiểu chữ chính: {typography} – nét đẹp, đậm nhạt tự nhiên, bố trí chính giữa, chữ lớn nổi bật:
\"{segment}\"

Phong cách nền và hình minh họa: {background}
{detail_block}

<<HÌNH MINH HỌA BIỂU TƯỢNG RIÊNG CHO NỘI DUNG>>
Chủ thể chính: {subject}
Bối cảnh: {context}
Tông màu & Cảm xúc: {tone}
Biểu tượng: {symbol}

Bên trái dọc theo chiều đứng, ghi nhỏ: {signature}

Kèm dấu triện mộc đỏ truyền thống nhỏ gần tên.

Toàn bộ tông màu {closing_tone}, nghệ thuật cao, sâu lắng triết lý.

--ar {ratio} --stylize 700 --q 2
]",
        context = meta.context,
        symbol = meta.symbol,
        ratio = style.aspect_ratio.as_str(),
    )
}

//! Fixed option lists offered to the user and the lookup tables the prompt
//! assembler resolves against.

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::models::{AspectRatio, BackgroundStyle, ContentStyle, TypographyStyle};

/// Orientation used when an aspect ratio has no entry in the table.
pub const DEFAULT_ORIENTATION: &str = "dọc";

/// Topic entry that asks for a user-typed topic instead.
pub const OTHER_TOPIC: &str = "Khác";

const ORIENTATIONS: [(&str, &str, &str); 2] = [
    ("9:16", "Dọc (9:16) - Điện thoại", "dọc"),
    ("16:9", "Ngang (16:9) - PC/TV", "ngang"),
];

pub const TOPICS: [&str; 19] = [
    "Chúc mừng năm mới (Tết)",
    "Triết lý cuộc sống",
    "Tôn sư trọng đạo (Thầy Cô)",
    "Công cha nghĩa mẹ (Chữ Hiếu)",
    "Khai trương & Kinh doanh (Tài Lộc)",
    "Chữ Tâm & Chữ Nhẫn (Tu thân)",
    "Bình an & Buông bỏ (Thiền)",
    "Tình yêu & Duyên phận",
    "Gia đình & Tổ ấm",
    "Vợ chồng nghĩa tình",
    "Động lực & Thành công",
    "Sức khỏe & Trường thọ",
    "Tình bạn & Tri kỷ",
    "Thưởng trà & Phong cảnh",
    "Ca dao tục ngữ Việt Nam",
    "Hài hước & Yêu đời",
    "Cà phê & Suy ngẫm",
    "Lý tưởng tuổi trẻ",
    OTHER_TOPIC,
];

pub fn orientation_for(aspect_ratio: &str) -> &'static str {
    ORIENTATIONS
        .iter()
        .find(|(ratio, _, _)| *ratio == aspect_ratio)
        .map(|(_, _, orientation)| *orientation)
        .unwrap_or(DEFAULT_ORIENTATION)
}

/// Long description appended after a canonical background name.
pub fn background_description(background: BackgroundStyle) -> Option<&'static str> {
    let description = match background {
        BackgroundStyle::InkWash => "nền giấy dó cũ kỹ vết ố vàng, sợi giấy lộ; hình minh họa mực nho loang dịu dàng, núi non mờ sương, cây cổ thụ.",
        BackgroundStyle::DongHoFolk => "nền giấy điệp lấp lánh (giấy quét vỏ sò); đường nét to khỏe, mảng màu đơn giản, ấm cúng, đậm chất dân gian Việt Nam.",
        BackgroundStyle::Lacquer => "nền vóc đen bóng (then) hoặc đỏ son sâu thẳm; họa tiết thếp vàng, thếp bạc sang trọng, đài các, hiệu ứng chiều sâu lộng lẫy, bóng bẩy.",
        BackgroundStyle::Silk => "nền lụa tơ tằm mềm mại, óng ả, xuyên thấu nhẹ; nét vẽ loang màu watercolor nhẹ nhàng, mơ màng, nữ tính và lãng mạn.",
        BackgroundStyle::BatTrangCeramic => "nền men rạn ngà hoặc men trắng xanh cổ điển; họa tiết men lam (blue and white pottery), đường nét thanh thoát, tinh tế như gốm sứ.",
        BackgroundStyle::Sumie => "nền washi tinh tế; hình minh họa vài nét bút mực đen tối giản cực độ (Zen), nhiều khoảng trắng (negative space), không gian thiền.",
        BackgroundStyle::BacklitBambooPaper => "nền giấy trúc chỉ với xơ giấy lộ rõ, hiệu ứng ánh sáng vàng ấm áp xuyên qua từ phía sau (backlit); hình minh họa tạo hình bằng độ dày mỏng của giấy, tâm linh, huyền ảo.",
        BackgroundStyle::MistyGioPaper => "nền giấy gió mỏng manh, texture gợn sóng nhẹ; hình minh họa phiêu lãng, mờ ảo như trong giấc mơ, nét vẽ sương khói.",
        BackgroundStyle::DriedLotusLeaf => "nền texture lá sen khô nhăn nheo, màu nâu đất tự nhiên, gân lá rõ ràng; phong cách mộc mạc (Rustic), thô sơ nhưng tinh tế, gần gũi thiên nhiên.",
        BackgroundStyle::Sketchbook => "nền giấy vẽ chuyên dụng (Cold press) texture sần rõ; hình minh họa sketch chì than (charcoal) hoặc bút sắt chi tiết, shading tinh tế, nghệ thuật phương Tây.",
        BackgroundStyle::RusticWood => "nền gỗ nâu trầm vân rõ, vết thời gian nứt nẻ; hình minh họa khắc chìm hoặc vẽ mộc, bóng đổ sâu tạo khối 3D.",
        BackgroundStyle::ModernMinimal => "nền màu đơn sắc (solid color) hoặc gradient pastel nhẹ nhàng; hình minh họa vector flat design hoặc line art mảnh mai, hiện đại.",
        BackgroundStyle::AgedDoPaper => "nền giấy dó vàng óng cổ kính, viền cháy nhẹ; hình minh họa mang hơi hướng cung đình hoặc sớ táo quân, trang trọng.",
        BackgroundStyle::Other => return None,
    };
    Some(description)
}

/// Picks any topic except the free-form entry.
pub fn random_topic() -> &'static str {
    let choices: Vec<&'static str> = TOPICS.iter().copied().filter(|t| *t != OTHER_TOPIC).collect();
    choices.choose(&mut rand::thread_rng()).copied().unwrap_or(TOPICS[0])
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry<T: Serialize> {
    pub id: T,
    pub label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub aspect_ratios: Vec<CatalogEntry<AspectRatio>>,
    pub typography_styles: Vec<CatalogEntry<TypographyStyle>>,
    pub background_styles: Vec<CatalogEntry<BackgroundStyle>>,
    pub content_styles: Vec<CatalogEntry<ContentStyle>>,
    pub topics: Vec<&'static str>,
}

pub fn catalog() -> Catalog {
    let aspect_ratios = AspectRatio::ALL
        .iter()
        .map(|ratio| {
            let label = ORIENTATIONS
                .iter()
                .find(|(r, _, _)| *r == ratio.as_str())
                .map(|(_, label, _)| *label)
                .unwrap_or(ratio.as_str());
            CatalogEntry { id: *ratio, label, description: Some(orientation_for(ratio.as_str())) }
        })
        .collect();

    Catalog {
        aspect_ratios,
        typography_styles: TypographyStyle::ALL
            .iter()
            .map(|t| CatalogEntry { id: *t, label: t.label(), description: None })
            .collect(),
        background_styles: BackgroundStyle::ALL
            .iter()
            .map(|b| CatalogEntry { id: *b, label: b.label(), description: background_description(*b) })
            .collect(),
        content_styles: ContentStyle::ALL
            .iter()
            .map(|c| CatalogEntry { id: *c, label: c.label(), description: None })
            .collect(),
        topics: TOPICS.to_vec(),
    }
}

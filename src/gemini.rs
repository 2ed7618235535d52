use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::collaborator::{contemplative_meta, minimalist_meta, ContentService, ImageRenderer};
use crate::config::AppConfig;
use crate::models::{AspectRatio, ContentStyle, VisualMeta};
use crate::segmenter::VARIANT_DELIMITER;

/// Reply the extraction prompt asks for when the image holds no text.
const NO_TEXT_MARKER: &str = "NO_TEXT_FOUND";

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("Không tìm thấy chữ trong ảnh.")] NoTextFound,
    #[error("Empty response: {0}")] Empty(String),
    #[error("Other: {0}")] Other(String),
}

// Shorten inline base64 payloads so request/response logs stay readable
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

pub(crate) fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}...[{} chars total]", head, text.chars().count())
    }
}

/// One image model plus the options it accepts.
#[derive(Debug, Clone)]
struct RenderProfile {
    model: String,
    image_size: Option<&'static str>,
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    text_model: String,
    primary: RenderProfile,
    secondary: RenderProfile,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.clone(),
            text_model: config.text_model.clone(),
            primary: RenderProfile { model: config.image_model.clone(), image_size: Some("1K") },
            // the flash image model rejects imageSize
            secondary: RenderProfile { model: config.image_fallback_model.clone(), image_size: None },
        }
    }

    fn is_demo(&self) -> bool {
        self.api_key == crate::config::DEMO_KEY
    }

    async fn perform_api_call(&self, model: &str, request_body: serde_json::Value) -> Result<GeminiResponse, GeminiError> {
        // key travels in a header so it never shows up in URLs, logs or error strings
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        info!("🔗 Making request to: {}", url);

        let mut logged_body = request_body.clone();
        truncate_base64_in_json(&mut logged_body);
        info!("📤 Request body: {}", serde_json::to_string_pretty(&logged_body).unwrap_or_default());

        let response = self.client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.without_url().to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GeminiError::Http(format!("status={} body={}", status, error_body)));
        }

        let response_text = response.text().await
            .map_err(|e| GeminiError::Other(e.without_url().to_string()))?;

        let truncated_response = match serde_json::from_str::<serde_json::Value>(&response_text) {
            Ok(mut json_value) if response_text.len() > 1000 => {
                truncate_base64_in_json(&mut json_value);
                serde_json::to_string_pretty(&json_value).unwrap_or_else(|_| preview(&response_text, 1000))
            }
            _ => preview(&response_text, 1000),
        };
        info!("📥 Raw Gemini API response: {}", truncated_response);

        serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Other(format!("parse error: {}", e)))
    }

    pub async fn generate_text(&self, prompt: &str) -> Result<String, GeminiError> {
        info!("Generating text with Gemini API...");
        let payload = json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }]
        });
        let parsed = self.perform_api_call(&self.text_model, payload).await?;
        first_text(&parsed)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GeminiError::Empty("no text content in response".into()))
    }

    async fn request_visual_meta(
        &self,
        segment: &str,
        subject_hint: Option<&str>,
        tone_hint: Option<&str>,
    ) -> Result<Option<VisualMeta>, GeminiError> {
        let payload = json!({
            "contents": [{
                "parts": [{"text": visual_meta_prompt(segment, subject_hint, tone_hint)}]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "subject": {"type": "STRING"},
                        "context": {"type": "STRING"},
                        "tone": {"type": "STRING"},
                        "symbol": {"type": "STRING"}
                    },
                    "required": ["subject", "context", "tone", "symbol"]
                }
            }
        });
        let parsed = self.perform_api_call(&self.text_model, payload).await?;
        match first_text(&parsed).map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| GeminiError::Other(format!("metadata parse error: {}", e))),
            None => Ok(None),
        }
    }

    async fn render_with_profile(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        profile: &RenderProfile,
    ) -> Result<String, GeminiError> {
        let mut image_config = json!({ "aspectRatio": aspect_ratio.as_str() });
        if let Some(size) = profile.image_size {
            image_config["imageSize"] = json!(size);
        }
        let request_body = json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": image_config
            }
        });

        let parsed = self.perform_api_call(&profile.model, request_body).await?;
        let image = extract_first_image(&parsed)
            .ok_or_else(|| GeminiError::Empty(format!("no image data in {} response", profile.model)))?;
        info!("🖼️ Extracted image from {}: {}", profile.model, preview(&image, 50));
        Ok(image)
    }

    fn generate_placeholder_image(&self, prompt: &str) -> String {
        let palette = ["#1F2A36", "#8B3A3A", "#5B6B4E", "#A67C52", "#3E4C6D"];
        let color = palette[prompt.len() % palette.len()];
        let caption: String = quoted_segment(prompt).unwrap_or("Thư Pháp AI").chars().take(28).collect();

        let svg = format!(r##"<svg width="360" height="640" xmlns="http://www.w3.org/2000/svg">
            <rect width="360" height="640" fill="#F4ECD8" />
            <rect x="20" y="20" width="320" height="600" fill="none" stroke="{}" stroke-width="3" />
            <text x="180" y="320" font-family="serif" font-size="22" text-anchor="middle" fill="{}">{}</text>
            <rect x="40" y="560" width="36" height="36" fill="#B22222" />
        </svg>"##, color, color, escape_xml(&caption));

        format!("data:image/svg+xml;base64,{}", base64::engine::general_purpose::STANDARD.encode(svg.as_bytes()))
    }
}

#[async_trait]
impl ContentService for GeminiClient {
    async fn extract_text(&self, upload: Bytes) -> Result<String, GeminiError> {
        if self.is_demo() {
            info!("Using demo mode - returning sample calligraphy text");
            return Ok(DEMO_VERSES.join("\n"));
        }

        let mime_type = image::guess_format(&upload)
            .map(|format| format.to_mime_type())
            .unwrap_or("image/png");
        info!("🔍 Extracting text from {} image ({} bytes)", mime_type, upload.len());

        let payload = json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": mime_type, "data": base64::engine::general_purpose::STANDARD.encode(&upload)}},
                    {"text": EXTRACT_INSTRUCTION}
                ]
            }]
        });
        let parsed = self.perform_api_call(&self.text_model, payload).await?;
        let text = first_text(&parsed).map(str::trim).unwrap_or_default();
        if text.is_empty() || text == NO_TEXT_MARKER {
            warn!("⚠️ No text found in uploaded image");
            return Err(GeminiError::NoTextFound);
        }
        Ok(text.to_string())
    }

    async fn generate_content(&self, topic: &str, count: usize, style: ContentStyle) -> Result<String, GeminiError> {
        if self.is_demo() {
            info!("Using demo mode - cycling sample verses for topic '{}'", topic);
            let variants: Vec<&str> = DEMO_VERSES.iter().copied().cycle().take(count).collect();
            return Ok(variants.join(VARIANT_DELIMITER));
        }
        info!("🎯 Generating {} {:?} variants for topic '{}'", count, style, topic);
        self.generate_text(&topic_prompt(topic, count, style)).await
    }

    async fn expand_content(&self, original: &str, target: usize) -> Result<String, GeminiError> {
        if self.is_demo() {
            info!("Using demo mode - padding content with sample verses");
            let variants: Vec<&str> = std::iter::once(original)
                .chain(DEMO_VERSES.iter().copied().cycle())
                .take(target)
                .collect();
            return Ok(variants.join(VARIANT_DELIMITER));
        }
        info!("🎯 Expanding content into {} variants", target);
        self.generate_text(&expand_prompt(original, target)).await
    }

    async fn infer_visual_meta(&self, segment: &str, subject_hint: Option<&str>, tone_hint: Option<&str>) -> VisualMeta {
        if self.is_demo() {
            return minimalist_meta(subject_hint, tone_hint);
        }
        match self.request_visual_meta(segment, subject_hint, tone_hint).await {
            Ok(Some(meta)) => {
                info!("✅ Visual metadata for '{}': {}", preview(segment, 30), meta.subject);
                meta
            }
            Ok(None) => {
                warn!("⚠️ Empty metadata reply for '{}', using minimalist fallback", preview(segment, 30));
                minimalist_meta(subject_hint, tone_hint)
            }
            Err(e) => {
                error!("❌ Metadata inference failed for '{}': {}", preview(segment, 30), e);
                contemplative_meta(subject_hint, tone_hint)
            }
        }
    }
}

#[async_trait]
impl ImageRenderer for GeminiClient {
    async fn render_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<String, GeminiError> {
        if self.is_demo() {
            info!("Using demo mode - no real images generated");
            let placeholder = self.generate_placeholder_image(prompt);
            info!("📦 Generated placeholder image: {}", preview(&placeholder, 50));
            return Ok(placeholder);
        }

        match self.render_with_profile(prompt, aspect_ratio, &self.primary).await {
            Ok(image) => Ok(image),
            Err(primary_error) => {
                warn!("🔄 {} failed ({}), falling back to {}", self.primary.model, primary_error, self.secondary.model);
                match self.render_with_profile(prompt, aspect_ratio, &self.secondary).await {
                    Ok(image) => Ok(image),
                    Err(fallback_error) => {
                        error!("❌ Fallback render failed: {}", fallback_error);
                        Err(primary_error)
                    }
                }
            }
        }
    }
}

// --- Collaborator prompts ---

const EXTRACT_INSTRUCTION: &str = "Hãy nhìn vào bức ảnh này. Trích xuất CHÍNH XÁC và ĐẦY ĐỦ nội dung chữ (câu thơ, triết lý, lời chúc) có trong ảnh. Chỉ trả về đúng nội dung chữ đó, không thêm bất kỳ lời dẫn nào. Nếu ảnh không có chữ, trả về 'NO_TEXT_FOUND'.";

const DEMO_VERSES: [&str; 3] = [
    "Tâm an vạn sự an",
    "Nước chảy đá mòn, kiên nhẫn thành công",
    "Phúc như Đông Hải, thọ tỷ Nam Sơn",
];

fn topic_prompt(topic: &str, count: usize, style: ContentStyle) -> String {
    let style_instruction = match style {
        ContentStyle::Verse => "Yêu cầu hình thức: BẮT BUỘC là THƠ (Lục bát, Song thất lục bát, Thơ 4 chữ...) hoặc CÂU ĐỐI. Phải có vần điệu, ngắn gọn, súc tích.",
        ContentStyle::Prose => "Yêu cầu hình thức: BẮT BUỘC là VĂN XUÔI, Tản văn ngắn, Chiêm nghiệm hoặc Lời hay ý đẹp. Không viết thành thơ.",
    };
    format!(
        "Bạn là một nhà thư pháp và triết học am hiểu văn hóa Việt Nam.\n\
         Hãy sáng tạo đúng {count} nội dung khác nhau về chủ đề: \"{topic}\".\n\n\
         {style_instruction}\n\n\
         Yêu cầu chung: Sâu sắc, giàu cảm xúc, thấm đẫm văn hóa Việt.\n\
         Ngăn cách mỗi nội dung bằng dấu phân cách chính xác là: \"{VARIANT_DELIMITER}\"\n\
         KHÔNG đánh số thứ tự, KHÔNG thêm lời dẫn."
    )
}

fn expand_prompt(original: &str, target: usize) -> String {
    format!(
        "Tôi có nội dung gốc này: \"{original}\".\n\
         Nội dung này hơi ngắn để tạo {target} bức tranh riêng biệt.\n\
         Hãy giúp tôi sáng tạo thêm các biến thể hoặc câu ý nghĩa tương tự, sâu sắc, dựa trên ý gốc này để có đủ tổng cộng {target} nội dung khác nhau.\n\
         Yêu cầu:\n\
         1. Giữ nguyên ý nghĩa cốt lõi nhưng diễn đạt phong phú, thấm thía.\n\
         2. Ngăn cách mỗi nội dung bằng dấu phân cách chính xác là: \"{VARIANT_DELIMITER}\"\n\
         3. KHÔNG đánh số."
    )
}

fn visual_meta_prompt(segment: &str, subject_hint: Option<&str>, tone_hint: Option<&str>) -> String {
    let mut constraint = String::new();
    if let Some(subject) = subject_hint {
        constraint.push_str(&format!("\n- ƯU TIÊN TUYỆT ĐỐI Chủ thể chính là: \"{subject}\". Hãy xây dựng bối cảnh xung quanh chủ thể này."));
    }
    if let Some(tone) = tone_hint {
        constraint.push_str(&format!("\n- ƯU TIÊN TUYỆT ĐỐI Tông màu & Cảm xúc là: \"{tone}\"."));
    }
    format!(
        "Phân tích sâu sắc đoạn nội dung triết lý sau: \"{segment}\".\n\
         Hãy tưởng tượng ra một bức tranh nghệ thuật (thủy mặc/trừu tượng) dành cho NGƯỜI LỚN để minh họa cho triết lý này.\n\
         {constraint}\n\n\
         Hãy sinh ra các mô tả hình ảnh:\n\
         1. Chủ thể chính (Subject): Vật thể hoặc hình tượng trung tâm (Nếu đã có yêu cầu ở trên, hãy dùng nó).\n\
         2. Bối cảnh (Context): Môi trường hoặc nền phù hợp với chủ thể.\n\
         3. Tông màu & Cảm xúc (Tone): Màu sắc và không khí (Nếu đã có yêu cầu ở trên, hãy dùng nó).\n\
         4. Biểu tượng (Symbol): Ý nghĩa ẩn dụ của hình ảnh đó.\n\n\
         Trả về kết quả dưới dạng JSON."
    )
}

fn quoted_segment(prompt: &str) -> Option<&str> {
    let start = prompt.find('"')? + 1;
    let end = prompt[start..].find('"')? + start;
    Some(prompt[start..end].trim()).filter(|s| !s.is_empty())
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    #[allow(dead_code)]
    Other(serde_json::Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

fn first_text(resp: &GeminiResponse) -> Option<&str> {
    resp.candidates
        .first()?
        .content
        .parts
        .iter()
        .find_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        })
}

/// First inline image of any candidate, as a `data:` URL.
fn extract_first_image(resp: &GeminiResponse) -> Option<String> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                info!("🎯 Found image data with mime type: {}", inline_data.mime_type);
                return Some(format!("data:{};base64,{}", inline_data.mime_type, inline_data.data));
            }
        }
    }
    info!("⚠️ No inline image data found in response structure");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> GeminiResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn picks_first_text_part() {
        let resp = parse(r#"{"candidates":[{"content":{"parts":[{"text":"  Tâm an  "},{"text":"ignored"}]}}]}"#);
        assert_eq!(first_text(&resp), Some("  Tâm an  "));
        assert_eq!(first_text(&parse(r#"{"candidates":[]}"#)), None);
    }

    #[test]
    fn extracts_inline_image_as_data_url() {
        let resp = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"here you go"},{"inlineData":{"mimeType":"image/png","data":"iVBORw0KGgo"}}]}}]}"#,
        );
        assert_eq!(extract_first_image(&resp).as_deref(), Some("data:image/png;base64,iVBORw0KGgo"));
        assert_eq!(extract_first_image(&parse(r#"{"candidates":[{"content":{"parts":[{"text":"no"}]}}]}"#)), None);
    }

    #[test]
    fn unknown_parts_do_not_break_parsing() {
        let resp = parse(r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"x"}},{"text":"ok"}]}}]}"#);
        assert_eq!(first_text(&resp), Some("ok"));
    }

    #[test]
    fn base64_payloads_are_truncated_for_logs() {
        let data = "A".repeat(500);
        let mut value = json!({"contents": [{"parts": [{"inlineData": {"data": data, "mimeType": "image/png"}}]}]});
        truncate_base64_in_json(&mut value);
        let logged = value["contents"][0]["parts"][0]["inlineData"]["data"].as_str().unwrap();
        assert!(logged.contains("[truncated 450 chars]"));
    }

    #[test]
    fn meta_prompt_carries_hints_only_when_present() {
        let plain = visual_meta_prompt("Nhẫn", None, None);
        assert!(!plain.contains("ƯU TIÊN TUYỆT ĐỐI"));
        let hinted = visual_meta_prompt("Nhẫn", Some("Cá chép"), Some("Đỏ"));
        assert!(hinted.contains("Chủ thể chính là: \"Cá chép\""));
        assert!(hinted.contains("Tông màu & Cảm xúc là: \"Đỏ\""));
    }

    #[test]
    fn generation_prompts_request_the_delimiter() {
        assert!(topic_prompt("Tết", 3, ContentStyle::Verse).contains("đúng 3 nội dung"));
        assert!(topic_prompt("Tết", 3, ContentStyle::Prose).contains("VĂN XUÔI"));
        assert!(expand_prompt("Tâm", 4).contains(&format!("\"{VARIANT_DELIMITER}\"")));
    }

    #[test]
    fn placeholder_quotes_segment_text() {
        assert_eq!(quoted_segment("Kiểu chữ:\n\"Tâm <an>\"\nNền"), Some("Tâm <an>"));
        let client = GeminiClient::new(&AppConfig::default());
        let url = client.generate_placeholder_image("x \"Tâm\" y");
        assert!(url.starts_with("data:image/svg+xml;base64,"));
    }

    #[tokio::test]
    async fn demo_mode_answers_without_network() {
        let client = GeminiClient::new(&AppConfig::default());
        let generated = client.generate_content("Tết", 4, ContentStyle::Verse).await.unwrap();
        assert_eq!(generated.split(VARIANT_DELIMITER).count(), 4);

        let expanded = client.expand_content("Tâm an", 3).await.unwrap();
        assert!(expanded.starts_with("Tâm an|||"));

        let meta = client.infer_visual_meta("Tâm an", Some("Hoa sen"), None).await;
        assert_eq!(meta.subject, "Hoa sen");

        let image = client.render_image("\"Tâm an\"", AspectRatio::Portrait).await.unwrap();
        assert!(image.starts_with("data:image/svg+xml"));
    }

    #[test]
    fn non_ascii_data_fields_are_left_alone() {
        let data = "ữ".repeat(80);
        let mut value = json!({"data": data});
        truncate_base64_in_json(&mut value);
        assert_eq!(value["data"].as_str().map(|s| s.chars().count()), Some(80));
    }

    mod against_stub {
        use super::*;
        use crate::collaborator::{contemplative_meta, minimalist_meta};
        use axum::{
            http::{HeaderMap, StatusCode, Uri},
            Json, Router,
        };
        use parking_lot::Mutex;
        use std::sync::Arc;

        type Reply = fn(&str) -> (StatusCode, serde_json::Value);

        /// Serves every request with `reply(path)` and logs `"<uri> key=<header>"`.
        async fn stub(reply: Reply) -> (GeminiClient, Arc<Mutex<Vec<String>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let log = Arc::clone(&seen);
            let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap| {
                let log = Arc::clone(&log);
                async move {
                    let key = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()).unwrap_or("-").to_string();
                    log.lock().push(format!("{uri} key={key}"));
                    let (status, body) = reply(uri.path());
                    (status, Json(body))
                }
            });
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            (client_at(&format!("http://{addr}")), seen)
        }

        fn client_at(base: &str) -> GeminiClient {
            GeminiClient::new(&AppConfig { api_key: "test-key".into(), api_base: base.into(), ..AppConfig::default() })
        }

        fn text_reply(text: &str) -> serde_json::Value {
            json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
        }

        fn image_reply() -> serde_json::Value {
            json!({"candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "AAAA"}}]}}]})
        }

        fn empty_reply() -> serde_json::Value {
            json!({"candidates": [{"content": {"parts": []}}]})
        }

        #[tokio::test]
        async fn unreachable_service_gives_contemplative_meta() {
            let client = client_at("http://127.0.0.1:9");
            let meta = client.infer_visual_meta("Nhẫn", Some("Cá chép"), None).await;
            assert_eq!(meta, contemplative_meta(Some("Cá chép"), None));
        }

        #[tokio::test]
        async fn empty_meta_reply_gives_minimalist_meta() {
            let (client, _) = stub(|_| (StatusCode::OK, empty_reply())).await;
            let meta = client.infer_visual_meta("Nhẫn", None, Some("Tím")).await;
            assert_eq!(meta, minimalist_meta(None, Some("Tím")));
        }

        #[tokio::test]
        async fn meta_reply_is_parsed() {
            let (client, _) = stub(|_| {
                (StatusCode::OK, text_reply(r#"{"subject":"Núi","context":"Sương","tone":"Xám","symbol":"Vững"}"#))
            })
            .await;
            let meta = client.infer_visual_meta("Nhẫn", None, None).await;
            assert_eq!(meta.subject, "Núi");
            assert_eq!(meta.symbol, "Vững");
        }

        #[tokio::test]
        async fn no_text_marker_and_empty_reply_mean_no_text_found() {
            let upload = Bytes::from_static(b"\x89PNG\r\n\x1a\n");
            let (client, _) = stub(|_| (StatusCode::OK, text_reply(" NO_TEXT_FOUND \n"))).await;
            assert!(matches!(client.extract_text(upload.clone()).await, Err(GeminiError::NoTextFound)));

            let (client, _) = stub(|_| (StatusCode::OK, empty_reply())).await;
            assert!(matches!(client.extract_text(upload.clone()).await, Err(GeminiError::NoTextFound)));

            let (client, _) = stub(|_| (StatusCode::OK, text_reply("Tâm an"))).await;
            assert_eq!(client.extract_text(upload).await.unwrap(), "Tâm an");
        }

        #[tokio::test]
        async fn render_falls_back_to_secondary_model() {
            let (client, seen) = stub(|path| {
                if path.contains("gemini-3-pro-image-preview") {
                    (StatusCode::TOO_MANY_REQUESTS, json!({"error": "quota"}))
                } else {
                    (StatusCode::OK, image_reply())
                }
            })
            .await;
            let image = client.render_image("\"Tâm\"", AspectRatio::Landscape).await.unwrap();
            assert_eq!(image, "data:image/png;base64,AAAA");

            let seen = seen.lock().clone();
            assert_eq!(seen.len(), 2);
            assert!(seen[0].contains("gemini-3-pro-image-preview"));
            assert!(seen[1].contains("gemini-2.5-flash-image"));
            assert!(seen.iter().all(|call| call.ends_with("key=test-key") && !call.contains("?key=")));
        }

        #[tokio::test]
        async fn render_surfaces_primary_error_when_both_fail() {
            let (client, seen) = stub(|path| {
                if path.contains("gemini-3-pro-image-preview") {
                    (StatusCode::TOO_MANY_REQUESTS, json!({"error": "quota"}))
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "down"}))
                }
            })
            .await;
            let err = client.render_image("\"Tâm\"", AspectRatio::Portrait).await.unwrap_err();
            assert!(err.to_string().contains("429"), "got {err}");
            assert_eq!(seen.lock().len(), 2);
        }

        #[tokio::test]
        async fn transport_error_hides_the_key() {
            let client = client_at("http://127.0.0.1:9");
            let err = client.generate_content("Tết", 2, ContentStyle::Verse).await.unwrap_err();
            assert!(matches!(err, GeminiError::Http(_)));
            assert!(!err.to_string().contains("test-key"));
        }
    }
}

use crate::error::AppError;
use crate::models::StyleConfig;
use printpdf::*;
use std::io::BufWriter;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const LINE_HEIGHT: f32 = 4.2;
const BODY_SIZE: f32 = 9.0;
const WRAP_AT: usize = 100;

// Builtin fonts only cover WinAnsi, so Vietnamese letters are folded to their base letter
const FOLDS: [(&str, char); 14] = [
    ("àáạảãâầấậẩẫăằắặẳẵ", 'a'),
    ("ÀÁẠẢÃÂẦẤẬẨẪĂẰẮẶẲẴ", 'A'),
    ("èéẹẻẽêềếệểễ", 'e'),
    ("ÈÉẸẺẼÊỀẾỆỂỄ", 'E'),
    ("ìíịỉĩ", 'i'),
    ("ÌÍỊỈĨ", 'I'),
    ("òóọỏõôồốộổỗơờớợởỡ", 'o'),
    ("ÒÓỌỎÕÔỒỐỘỔỖƠỜỚỢỞỠ", 'O'),
    ("ùúụủũưừứựửữ", 'u'),
    ("ÙÚỤỦŨƯỪỨỰỬỮ", 'U'),
    ("ỳýỵỷỹ", 'y'),
    ("ỲÝỴỶỸ", 'Y'),
    ("đ", 'd'),
    ("Đ", 'D'),
];

/// Text-only prompt sheet: a cover block, then every prompt in order,
/// wrapped and flowed across as many A4 pages as needed.
pub fn generate_pdf(prompts: &[String], style: &StyleConfig) -> Result<Vec<u8>, AppError> {
    let (doc, page, layer) = PdfDocument::new("Calligraphy prompts", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::Internal(format!("pdf font: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::Internal(format!("pdf font: {e}")))?;

    let mut current = doc.get_page(page).get_layer(layer);
    current.use_text("Calligraphy Prompt Sheet", 20.0, Mm(MARGIN), Mm(PAGE_HEIGHT - 22.0), &bold);
    let summary = format!(
        "{} prompts | {} | {} | {}",
        prompts.len(),
        style.aspect_ratio.as_str(),
        style.typography.label(),
        style.background.label()
    );
    current.use_text(fold(&summary), 10.0, Mm(MARGIN), Mm(PAGE_HEIGHT - 32.0), &font);

    let mut y = PAGE_HEIGHT - 45.0;
    for (index, prompt) in prompts.iter().enumerate() {
        let lines: Vec<String> = prompt.lines().flat_map(|line| wrap(&fold(line), WRAP_AT)).collect();
        // keep the heading with at least a few lines of its prompt
        if y - LINE_HEIGHT * 4.0 < MARGIN {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Prompt {}", index + 1));
            current = doc.get_page(page).get_layer(layer);
            y = PAGE_HEIGHT - MARGIN;
        }
        current.use_text(format!("Prompt {}/{}", index + 1, prompts.len()), 12.0, Mm(MARGIN), Mm(y), &bold);
        y -= LINE_HEIGHT * 1.6;

        for line in lines {
            if y < MARGIN {
                let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Prompt {} (cont.)", index + 1));
                current = doc.get_page(page).get_layer(layer);
                y = PAGE_HEIGHT - MARGIN;
            }
            current.use_text(line, BODY_SIZE, Mm(MARGIN), Mm(y), &font);
            y -= LINE_HEIGHT;
        }
        y -= LINE_HEIGHT * 2.0;
    }

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut writer = BufWriter::new(&mut buf);
        doc.save(&mut writer).map_err(|e| AppError::Internal(format!("pdf save: {e}")))?;
    }
    Ok(buf)
}

fn fold(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            if c.is_ascii() {
                return Some(c);
            }
            if ('\u{0300}'..='\u{036F}').contains(&c) {
                return None;
            }
            if c == '–' || c == '—' {
                return Some('-');
            }
            let folded = FOLDS.iter().find(|(group, _)| group.contains(c)).map(|(_, base)| *base);
            Some(folded.unwrap_or('?'))
        })
        .collect()
}

/// Greedy word wrap by character count; overlong words are hard-split.
fn wrap(line: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > width {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            out.push(head);
        }
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_vietnamese_to_ascii() {
        assert_eq!(fold("Thư pháp cổ điển – Đỗ"), "Thu phap co dien - Do");
        assert_eq!(fold("漢"), "?");
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(wrap("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap("", 10), vec![String::new()]);
    }

    #[test]
    fn produces_a_pdf_document() {
        let long = "chữ ".repeat(2000);
        let prompts = vec!["[Tạo một bức tranh]".to_string(), long];
        let bytes = generate_pdf(&prompts, &StyleConfig::default()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}

//! Splits source content into the ordered segments that each become one prompt.
//!
//! Rules, first match wins: explicit variant delimiter, then line breaks
//! (merging adjacent lines when there are too many), then sentences when the
//! whole content is a single line. The result never exceeds the target count
//! but may fall short of it; [`fit_to_count`] pads it.

use std::sync::LazyLock;

use regex::Regex;

/// Separator the content collaborator places between generated variants.
pub const VARIANT_DELIMITER: &str = "|||";

/// Target used to ask "how many natural units does this text have?".
pub const SUFFICIENCY_PROBE: usize = 999;

static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]*[^.!?]+[.!?]*").expect("sentence pattern is valid"));

pub fn segment(text: &str, target: usize) -> Vec<String> {
    if target == 0 {
        return Vec::new();
    }
    let normalized = text.replace("\r\n", "\n");
    let clean = normalized.trim();
    if clean.is_empty() {
        return Vec::new();
    }

    if clean.contains(VARIANT_DELIMITER) {
        let variants: Vec<String> = clean
            .split(VARIANT_DELIMITER)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .take(target)
            .map(String::from)
            .collect();
        if !variants.is_empty() {
            return variants;
        }
    }

    let lines: Vec<&str> = clean.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut segments = if lines.len() > target {
        merge_lines(&lines, target)
    } else {
        lines.iter().map(|l| l.to_string()).collect()
    };

    if segments.len() == 1 && target > 1 {
        if let Some(groups) = split_sentences(&segments[0], target) {
            segments = groups;
        }
    }

    segments.truncate(target);
    segments
}

/// Pads with empty segments or truncates so exactly `target` remain.
pub fn fit_to_count(mut segments: Vec<String>, target: usize) -> Vec<String> {
    segments.resize(target, String::new());
    segments
}

/// Greedy contiguous buckets of `ceil(n / target)` lines; the last bucket
/// takes whatever is left so no extra trailing bucket appears.
fn merge_lines(lines: &[&str], target: usize) -> Vec<String> {
    let bucket_size = lines.len().div_ceil(target);
    let mut buckets = Vec::with_capacity(target);
    let mut current: Vec<&str> = Vec::with_capacity(bucket_size);

    for line in lines {
        current.push(line);
        if current.len() >= bucket_size && buckets.len() < target - 1 {
            buckets.push(current.join("\n"));
            current.clear();
        }
    }
    if !current.is_empty() {
        buckets.push(current.join("\n"));
    }
    buckets
}

fn split_sentences(block: &str, target: usize) -> Option<Vec<String>> {
    let sentences: Vec<&str> = SENTENCE
        .find_iter(block)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.len() < target {
        return None;
    }
    let group_size = sentences.len().div_ceil(target);
    Some(sentences.chunks(group_size).map(|group| group.join("\n")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn delimiter_splits_exactly() {
        assert_eq!(segment("a|||b|||c", 3), strings(&["a", "b", "c"]));
    }

    #[test]
    fn delimiter_discards_extra_variants() {
        assert_eq!(segment("a|||b|||c|||d", 2), strings(&["a", "b"]));
    }

    #[test]
    fn delimiter_trims_and_drops_empty_variants() {
        assert_eq!(segment("  one  |||   ||| two\n|||", 5), strings(&["one", "two"]));
    }

    #[test]
    fn delimiter_wins_over_line_breaks() {
        let text = "line one\nline two|||line three";
        assert_eq!(segment(text, 3), strings(&["line one\nline two", "line three"]));
    }

    #[test]
    fn lines_merge_into_contiguous_buckets() {
        assert_eq!(segment("l1\nl2\nl3\nl4", 2), strings(&["l1\nl2", "l3\nl4"]));
    }

    #[test]
    fn last_bucket_absorbs_remaining_lines() {
        // ceil(5 / 2) = 3 lines per bucket
        assert_eq!(segment("1\n2\n3\n4\n5", 2), strings(&["1\n2\n3", "4\n5"]));
        // ceil(7 / 3) = 3, third bucket gets the single leftover
        assert_eq!(segment("1\n2\n3\n4\n5\n6\n7", 3), strings(&["1\n2\n3", "4\n5\n6", "7"]));
    }

    #[test]
    fn line_merge_may_fall_short_of_target() {
        // ceil(5 / 4) = 2 lines per bucket gives three buckets
        assert_eq!(segment("1\n2\n3\n4\n5", 4), strings(&["1\n2", "3\n4", "5"]));
    }

    #[test]
    fn single_target_collapses_all_lines() {
        assert_eq!(segment("a\n\n b \r\nc", 1), strings(&["a\nb\nc"]));
    }

    #[test]
    fn blank_lines_are_dropped() {
        assert_eq!(segment("\n\nfirst\n   \nsecond\n\n", 3), strings(&["first", "second"]));
    }

    #[test]
    fn sentences_split_a_single_block() {
        assert_eq!(segment("A. B. C.", 3), strings(&["A.", "B.", "C."]));
    }

    #[test]
    fn sentences_are_grouped_when_plentiful() {
        let result = segment("One! Two? Three. Four. Five", 2);
        assert_eq!(result, strings(&["One!\nTwo?\nThree.", "Four.\nFive"]));
    }

    #[test]
    fn too_few_sentences_keep_the_block() {
        assert_eq!(segment("Only one sentence here.", 3), strings(&["Only one sentence here."]));
        assert_eq!(segment("no punctuation at all", 5), strings(&["no punctuation at all"]));
    }

    #[test]
    fn leading_punctuation_stays_with_its_sentence() {
        assert_eq!(segment("...Wait. Go.", 2), strings(&["...Wait.", "Go."]));
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(segment("", 3).is_empty());
        assert!(segment("   \n  ", 3).is_empty());
        assert!(segment("text", 0).is_empty());
    }

    #[test]
    fn never_exceeds_target_and_preserves_line_order() {
        let texts = [
            "a\nb\nc\nd\ne\nf\ng\nh\ni",
            "Một. Hai. Ba. Bốn. Năm. Sáu.",
            "x|||y|||z|||w|||v|||u",
            "single",
            "p1\n\np2\np3",
        ];
        for text in texts {
            for target in 1..=5 {
                let result = segment(text, target);
                assert!(result.len() <= target, "{text:?} @ {target}: {result:?}");
                assert_eq!(fit_to_count(result.clone(), target).len(), target);

                if !text.contains(VARIANT_DELIMITER) && text.lines().filter(|l| !l.trim().is_empty()).count() > 1 {
                    let rejoined: Vec<&str> = result.iter().flat_map(|s| s.lines()).collect();
                    let original: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
                    assert_eq!(rejoined, original, "lines dropped or reordered for {target}");
                }
            }
        }
    }

    #[test]
    fn fit_to_count_pads_and_truncates() {
        assert_eq!(fit_to_count(strings(&["a"]), 3), strings(&["a", "", ""]));
        assert_eq!(fit_to_count(strings(&["a", "b", "c"]), 2), strings(&["a", "b"]));
    }

    #[test]
    fn sufficiency_probe_counts_natural_units() {
        assert_eq!(segment("one\ntwo", SUFFICIENCY_PROBE).len(), 2);
        assert_eq!(segment("A. B. C.", SUFFICIENCY_PROBE).len(), 1);
    }
}

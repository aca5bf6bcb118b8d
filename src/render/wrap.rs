//! Width-based word wrapping for the builtin Helvetica faces.
//!
//! Builtin PDF fonts carry no metrics we can query, so widths are
//! estimated from an average glyph width of half the font size.

const PT_TO_MM: f32 = 0.3528;
const AVG_GLYPH_EM: f32 = 0.5;

/// Estimated width of one average glyph, in millimetres.
pub fn glyph_width_mm(font_pt: f32) -> f32 {
    font_pt * AVG_GLYPH_EM * PT_TO_MM
}

/// Estimated rendered width of `text`, in millimetres.
pub fn text_width_mm(text: &str, font_pt: f32) -> f32 {
    text.chars().count() as f32 * glyph_width_mm(font_pt)
}

/// Wraps `text` into lines no wider than `width_mm`.
///
/// Explicit newlines are kept. A word longer than a whole line is broken
/// at the character limit. Empty input yields a single empty line.
pub fn wrap_to_width(text: &str, width_mm: f32, font_pt: f32) -> Vec<String> {
    let max_chars = ((width_mm / glyph_width_mm(font_pt)).floor() as usize).max(1);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        wrap_paragraph(paragraph, max_chars, &mut lines);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn wrap_paragraph(text: &str, max_chars: usize, lines: &mut Vec<String>) {
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        // Hard-break words that cannot fit on any line.
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }

        if current_len > 0 && current_len + 1 + word.len() > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 10pt Helvetica: 1.764mm per glyph, so 17.64mm holds 10 characters.
    const TEN_CHARS: f32 = 17.7;

    #[test]
    fn short_text_single_line() {
        assert_eq!(wrap_to_width("Cough", TEN_CHARS, 10.0), vec!["Cough"]);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(
            wrap_to_width("take after food daily", TEN_CHARS, 10.0),
            vec!["take after", "food daily"]
        );
    }

    #[test]
    fn long_word_is_hard_broken() {
        assert_eq!(
            wrap_to_width("Hydroxychloroquine", TEN_CHARS, 10.0),
            vec!["Hydroxychl", "oroquine"]
        );
    }

    #[test]
    fn empty_text_is_one_empty_line() {
        assert_eq!(wrap_to_width("", TEN_CHARS, 10.0), vec![String::new()]);
        assert_eq!(wrap_to_width("   ", TEN_CHARS, 10.0), vec![String::new()]);
    }

    #[test]
    fn newlines_start_new_lines() {
        assert_eq!(wrap_to_width("a\nb", TEN_CHARS, 10.0), vec!["a", "b"]);
    }

    #[test]
    fn no_line_exceeds_width() {
        let text = "Paracetamol 500mg three times a day after food for five days, \
                    stop if rash develops and report immediately";
        for line in wrap_to_width(text, 40.0, 9.0) {
            assert!(text_width_mm(&line, 9.0) <= 40.0, "{line}");
        }
    }

    #[test]
    fn tiny_width_still_progresses() {
        let lines = wrap_to_width("abc", 0.1, 10.0);
        assert_eq!(lines, vec!["a", "b", "c"]);
    }
}

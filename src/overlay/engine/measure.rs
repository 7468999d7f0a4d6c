//! Text measurement for the font-fit solver.
//!
//! A [`TextMeasurer`] only has to report how wide a single unbroken run of
//! text is, in em. Line breaking, letter spacing and line height are shared
//! by every implementation so that fitting and final rendering wrap the same
//! way.

use anyhow::Result;

/// Typographic settings that influence measured height.
#[derive(Debug, Clone, PartialEq)]
pub struct FontStyle {
    pub family: Option<String>,
    pub weight: u16,
    /// Line box height as a multiple of the font size.
    pub line_height: f32,
    /// Extra advance after every character, in em. Negative tightens.
    pub letter_spacing_em: f32,
}

impl Default for FontStyle {
    fn default() -> Self {
        Self {
            family: None,
            weight: 600,
            line_height: 1.15,
            letter_spacing_em: -0.02,
        }
    }
}

/// Wrapped text block at a given font size.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<String>,
    pub line_height: f32,
    pub height: f32,
}

pub trait TextMeasurer {
    /// Advance width of `text` set on one line at 1px font size, without letter spacing.
    fn advance_em(&self, text: &str) -> Result<f32>;

    fn line_width(&self, text: &str, font_size: f32, style: &FontStyle) -> Result<f32> {
        let chars = text.chars().count() as f32;
        let em = self.advance_em(text)? + style.letter_spacing_em * chars;
        Ok((em * font_size).max(0.0))
    }

    fn layout(
        &self,
        text: &str,
        max_width: f32,
        font_size: f32,
        style: &FontStyle,
    ) -> Result<TextLayout> {
        wrap_text(self, text, max_width, font_size, style)
    }

    /// Rendered height of `text` wrapped to `max_width` at `font_size`.
    fn measure(&self, text: &str, max_width: f32, font_size: f32, style: &FontStyle) -> Result<f32> {
        Ok(self.layout(text, max_width, font_size, style)?.height)
    }
}

/// Fallback measurer that estimates advances per character class.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMeasurer;

impl TextMeasurer for HeuristicMeasurer {
    fn advance_em(&self, text: &str) -> Result<f32> {
        Ok(text.chars().map(estimate_char_em).sum())
    }
}

pub(crate) fn estimate_char_em(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if is_cjk(ch) {
        1.0
    } else {
        0.9
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF00..=0xFFEF
    )
}

/// Greedy line breaking at whitespace. A word wider than `max_width` on its
/// own is split at character boundaries so it never overflows horizontally.
/// Explicit newlines always start a new line.
pub(crate) fn wrap_text<M: TextMeasurer + ?Sized>(
    measurer: &M,
    text: &str,
    max_width: f32,
    font_size: f32,
    style: &FontStyle,
) -> Result<TextLayout> {
    let line_height = font_size * style.line_height;
    let mut lines = Vec::new();
    if text.trim().is_empty() {
        return Ok(TextLayout {
            lines,
            line_height,
            height: 0.0,
        });
    }

    for paragraph in text.trim().split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if measurer.line_width(&candidate, font_size, style)? <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measurer.line_width(word, font_size, style)? <= max_width {
                current = word.to_string();
                continue;
            }
            for ch in word.chars() {
                let mut next = current.clone();
                next.push(ch);
                if !current.is_empty() && measurer.line_width(&next, font_size, style)? > max_width
                {
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                } else {
                    current = next;
                }
            }
        }
        lines.push(current);
    }

    let height = lines.len() as f32 * line_height;
    Ok(TextLayout {
        lines,
        line_height,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{FailingMeasurer, LinearMeasurer};

    fn plain() -> FontStyle {
        FontStyle {
            letter_spacing_em: 0.0,
            line_height: 1.0,
            ..FontStyle::default()
        }
    }

    #[test]
    fn wraps_at_word_boundaries() {
        let measurer = LinearMeasurer::new(1.0);
        let layout = measurer
            .layout("aaa bbb ccc", 7.0, 1.0, &plain())
            .expect("layout");
        assert_eq!(layout.lines, vec!["aaa bbb", "ccc"]);
        assert_eq!(layout.height, 2.0);
    }

    #[test]
    fn long_word_breaks_at_characters() {
        let measurer = LinearMeasurer::new(1.0);
        let layout = measurer
            .layout("abcdefghij xy", 4.0, 1.0, &plain())
            .expect("layout");
        assert_eq!(layout.lines, vec!["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn explicit_newlines_start_new_lines() {
        let measurer = LinearMeasurer::new(1.0);
        let layout = measurer
            .layout("hi\nthere", 100.0, 10.0, &plain())
            .expect("layout");
        assert_eq!(layout.lines, vec!["hi", "there"]);
        assert_eq!(layout.height, 20.0);
    }

    #[test]
    fn empty_text_has_no_height() {
        let layout = HeuristicMeasurer
            .layout("   ", 100.0, 12.0, &FontStyle::default())
            .expect("layout");
        assert!(layout.lines.is_empty());
        assert_eq!(layout.height, 0.0);
    }

    #[test]
    fn letter_spacing_tightens_lines() {
        let measurer = LinearMeasurer::new(1.0);
        let tight = FontStyle {
            letter_spacing_em: -0.5,
            ..plain()
        };
        assert_eq!(measurer.line_width("abcd", 2.0, &plain()).expect("w"), 8.0);
        assert_eq!(measurer.line_width("abcd", 2.0, &tight).expect("w"), 4.0);
    }

    #[test]
    fn height_never_decreases_with_font_size() {
        let style = FontStyle::default();
        let texts = [
            "Hello there, this is a test bubble",
            "Supercalifragilisticexpialidocious words everywhere",
            "短い日本語のテキストです",
            "a b c d e f g h i j k l m n o p",
        ];
        for text in texts {
            for width in [20.0_f32, 57.0, 120.0, 300.0] {
                let mut previous = 0.0;
                for size in 1..=40 {
                    let height = HeuristicMeasurer
                        .measure(text, width, size as f32, &style)
                        .expect("measure");
                    assert!(
                        height >= previous,
                        "{text:?} width {width} size {size}: {height} < {previous}"
                    );
                    previous = height;
                }
            }
        }
    }

    #[test]
    fn measurement_failure_propagates() {
        let err = FailingMeasurer
            .measure("text", 100.0, 12.0, &FontStyle::default())
            .expect_err("must fail");
        assert!(err.to_string().contains("measurement unavailable"));
    }
}

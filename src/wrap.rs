//! Text Layout - greedy wrapping and centering inside a layout box

use crate::layout::LayoutBox;

/// Anything that can report the rendered width of a run of text in pixels.
pub trait TextMeasure {
    fn text_width(&self, text: &str) -> u32;
}

impl<T: TextMeasure + ?Sized> TextMeasure for &T {
    fn text_width(&self, text: &str) -> u32 {
        (**self).text_width(text)
    }
}

/// One wrapped line with its final pixel position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
}

/// Greedily pack whitespace-separated words into lines no wider than
/// `max_width`. A word that is wider than the box on its own gets a line to
/// itself, unbroken.
pub fn wrap_words<M: TextMeasure>(text: &str, max_width: u32, measure: &M) -> Vec<String> {
    let mut lines = vec![];
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if measure.text_width(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Left edge of a line centered in `[x, x + max_width]`, floor-divided.
/// Lines wider than the box get a negative offset and spill out on both
/// sides; the leftover pixel of an odd difference goes to the right.
pub fn centered_x(x: i32, max_width: u32, line_width: u32) -> i32 {
    let slack = i64::from(max_width) - i64::from(line_width);
    let left = i64::from(x) + slack.div_euclid(2);
    left.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Vertical distance between consecutive baselines: floor(1.2 * font_size).
pub fn line_pitch(font_size: u32) -> u32 {
    font_size.saturating_mul(6) / 5
}

/// Wrap `text` into `bounds` and position every line.
pub fn layout_text<M: TextMeasure>(
    text: &str,
    bounds: &LayoutBox,
    font_size: u32,
    measure: &M,
) -> Vec<PlacedLine> {
    let pitch = line_pitch(font_size) as i32;
    wrap_words(text, bounds.max_width, measure)
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let width = measure.text_width(&line);
            PlacedLine {
                x: centered_x(bounds.x, bounds.max_width, width),
                y: bounds.y.saturating_add(pitch.saturating_mul(i as i32)),
                width,
                text: line,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character advances by a fixed number of pixels.
    struct Fixed(u32);

    impl TextMeasure for Fixed {
        fn text_width(&self, text: &str) -> u32 {
            text.chars().count() as u32 * self.0
        }
    }

    #[test]
    fn test_single_line_fits() {
        let lines = wrap_words("John Doe", 200, &Fixed(15));
        assert_eq!(lines, vec!["John Doe"]);
    }

    #[test]
    fn test_wraps_at_box_width() {
        // 10px per char, 50px box: "aaaa bbbb" is 90px
        let lines = wrap_words("aaaa bbbb cc", 50, &Fixed(10));
        assert_eq!(lines, vec!["aaaa", "bbbb", "cc"]);
    }

    #[test]
    fn test_exact_fit_stays_on_line() {
        let lines = wrap_words("ab cd", 50, &Fixed(10));
        assert_eq!(lines, vec!["ab cd"]);
    }

    #[test]
    fn test_oversize_word_unbroken() {
        let lines = wrap_words("Extraordinarily", 50, &Fixed(10));
        assert_eq!(lines, vec!["Extraordinarily"]);
    }

    #[test]
    fn test_oversize_word_between_short_words() {
        let lines = wrap_words("a Extraordinarily b", 50, &Fixed(10));
        assert_eq!(lines, vec!["a", "Extraordinarily", "b"]);
    }

    #[test]
    fn test_zero_width_puts_every_word_on_its_own_line() {
        let lines = wrap_words("one two three", 0, &Fixed(10));
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_whitespace_collapses() {
        let lines = wrap_words("  a \t b\n c  ", 1000, &Fixed(10));
        assert_eq!(lines, vec!["a b c"]);
        assert!(wrap_words("   ", 100, &Fixed(10)).is_empty());
        assert!(wrap_words("", 100, &Fixed(10)).is_empty());
    }

    #[test]
    fn test_wrapping_preserves_words() {
        let text = "Reason of Leaving the School is further studies at a college abroad";
        for width in [0, 30, 70, 120, 400, 10_000] {
            let lines = wrap_words(text, width, &Fixed(7));
            let rejoined = lines.join(" ");
            let original: Vec<_> = text.split_whitespace().collect();
            let got: Vec<_> = rejoined.split_whitespace().collect();
            assert_eq!(original, got, "width {}", width);
        }
    }

    #[test]
    fn test_centered_x_example() {
        assert_eq!(centered_x(100, 200, 120), 140);
    }

    #[test]
    fn test_centered_x_floors_odd_slack() {
        assert_eq!(centered_x(0, 11, 0), 5);
        assert_eq!(centered_x(10, 100, 33), 10 + 33);
    }

    #[test]
    fn test_centered_x_overflow_shifts_left() {
        assert_eq!(centered_x(0, 50, 150), -50);
        // zero-width box: left-shift by half the text width
        assert_eq!(centered_x(37, 0, 80), -3);
        // floor, not truncation toward zero
        assert_eq!(centered_x(0, 0, 15), -8);
    }

    #[test]
    fn test_layout_text_oversize_line_straddles_box() {
        let bounds = LayoutBox::new(100, 0, 40);
        let lines = layout_text("Extraordinarily", &bounds, 20, &Fixed(10));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].x, 45);
        let center = lines[0].x + lines[0].width as i32 / 2;
        assert_eq!(center, bounds.x + bounds.max_width as i32 / 2);
    }

    #[test]
    fn test_line_pitch() {
        assert_eq!(line_pitch(20), 24);
        assert_eq!(line_pitch(60), 72);
        assert_eq!(line_pitch(33), 39);
    }

    #[test]
    fn test_layout_text_positions() {
        let bounds = LayoutBox::new(100, 50, 200);
        let lines = layout_text("John Doe", &bounds, 20, &Fixed(15));
        assert_eq!(
            lines,
            vec![PlacedLine { text: "John Doe".into(), x: 140, y: 50, width: 120 }]
        );

        let bounds = LayoutBox::new(0, 10, 40);
        let lines = layout_text("abcd ef", &bounds, 20, &Fixed(10));
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0].x, lines[0].y), (0, 10));
        assert_eq!((lines[1].x, lines[1].y), (10, 34));
    }
}

//! Terminal styling with NO_COLOR support.

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Check if color output is enabled (respects `NO_COLOR` env var).
pub fn color_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

/// ANSI styling, or nothing when colors are off.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    enabled: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self::new()
    }
}

impl Style {
    pub fn new() -> Self {
        Self {
            enabled: color_enabled(),
        }
    }

    /// Colors only when writing to a terminal and `NO_COLOR` is unset.
    pub fn for_output(is_tty: bool) -> Self {
        Self {
            enabled: is_tty && color_enabled(),
        }
    }

    /// Create a style with colors explicitly enabled (for tests).
    pub fn force_enabled() -> Self {
        Self { enabled: true }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    fn code(&self, seq: &'static str) -> &'static str {
        if self.enabled {
            seq
        } else {
            ""
        }
    }

    pub fn dim_start(&self) -> &'static str {
        self.code(DIM)
    }

    pub fn bold_start(&self) -> &'static str {
        self.code(BOLD)
    }

    pub fn red_start(&self) -> &'static str {
        self.code(RED)
    }

    pub fn reset(&self) -> &'static str {
        self.code(RESET)
    }
}

/// Compute visible width of a string, ignoring ANSI escape sequences.
pub fn visible_width(s: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    for c in s.chars() {
        if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if c == '\x1b' {
            in_escape = true;
        } else {
            width += char_width(c);
        }
    }
    width
}

/// Approximate terminal columns taken by a character.
fn char_width(c: char) -> usize {
    if c < ' ' {
        return 0;
    }
    if c.is_ascii() {
        return 1;
    }
    let cp = c as u32;
    let wide = (0x1100..=0x115F).contains(&cp)   // Hangul Jamo
        || (0x2E80..=0x303E).contains(&cp)       // CJK Radicals
        || (0x3040..=0x33BF).contains(&cp)       // Hiragana, Katakana
        || (0x3400..=0x4DBF).contains(&cp)       // CJK Extension A
        || (0x4E00..=0x9FFF).contains(&cp)       // CJK Unified
        || (0xAC00..=0xD7A3).contains(&cp)       // Hangul Syllables
        || (0xF900..=0xFAFF).contains(&cp)       // CJK Compatibility
        || (0xFE30..=0xFE6F).contains(&cp)       // CJK Compatibility Forms
        || (0xFF01..=0xFF60).contains(&cp)       // Fullwidth Forms
        || (0x1F300..=0x1FAFF).contains(&cp)     // Emoji
        || (0x20000..=0x2FFFF).contains(&cp); // CJK Extension B+
    if wide {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_returns_empty_codes() {
        let style = Style::disabled();
        assert_eq!(style.dim_start(), "");
        assert_eq!(style.bold_start(), "");
        assert_eq!(style.red_start(), "");
        assert_eq!(style.reset(), "");
    }

    #[test]
    fn enabled_returns_escape_codes() {
        let style = Style::force_enabled();
        assert_eq!(style.dim_start(), "\x1b[2m");
        assert_eq!(style.red_start(), "\x1b[31m");
        assert_eq!(style.reset(), "\x1b[0m");
    }

    #[test]
    fn no_colors_off_a_terminal() {
        assert_eq!(Style::for_output(false).red_start(), "");
    }

    #[test]
    fn visible_width_strips_ansi() {
        assert_eq!(visible_width("hello"), 5);
        assert_eq!(visible_width("\x1b[31mhello\x1b[0m"), 5);
        assert_eq!(visible_width(""), 0);
    }

    #[test]
    fn visible_width_counts_wide_chars() {
        assert_eq!(visible_width("日本"), 4);
        assert_eq!(visible_width("openai · gpt"), 12);
        assert_eq!(visible_width("한글"), 4);
    }
}

//! Deterministic cleanup of raw OCR model output.
//!
//! Vision models follow the "return only the text" instruction most of the
//! time, but not always: they wrap the answer in code fences, emit CRLF, pad
//! lines with spaces, or leak zero-width characters from their tokenizer.
//! Each rule below is a pure `&str -> String` pass.
//!
//! ## Rule Order
//!
//! Fences are stripped first so the remaining rules see the real text; line
//! endings are normalised before trimming so `\r` is not mistaken for content.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to an OCR response.
///
/// 1. Strip outer code fences (```` ``` ````, ```` ```text ````, ```` ```markdown ````)
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of 3+ blank lines down to one blank line
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
///
/// The result is trimmed; an all-whitespace response becomes `""`.
pub fn clean_ocr_text(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|text|plaintext)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap()
});

fn strip_code_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 5: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_plain_and_tagged_fences() {
        assert_eq!(strip_code_fences("```\nHola\nmundo\n```"), "Hola\nmundo");
        assert_eq!(strip_code_fences("```text\nHola\n```"), "Hola");
        assert_eq!(strip_code_fences("```markdown\n# T\n```  "), "# T");
    }

    #[test]
    fn inner_fences_are_kept() {
        let input = "Intro\n```\ncode\n```\nOutro";
        assert_eq!(strip_code_fences(input), input);
    }

    #[test]
    fn line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("  a  \nb\t"), "  a\nb");
    }

    #[test]
    fn blank_runs_collapse_to_one_blank_line() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn pipe_rows_pass_through_untouched() {
        let input = "| A | B |\n| --- | --- |\n| 1 | 2 |\n|---|---|\n| 3 | 4 |";
        assert_eq!(clean_ocr_text(input), input);
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(
            remove_invisible_chars("Fac\u{200B}tura\u{FEFF} n\u{00AD}º"),
            "Factura nº"
        );
    }

    #[test]
    fn full_cleanup() {
        let raw = "```text\r\nFACTURA 2024   \r\n\r\n\r\n\r\nTotal: 1.234,56 €\u{200B}\r\n```\n";
        assert_eq!(clean_ocr_text(raw), "FACTURA 2024\n\nTotal: 1.234,56 €");
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        assert_eq!(clean_ocr_text("  \n\n\t "), "");
    }
}

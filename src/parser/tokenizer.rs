// ==========================================
// PV PAN Tool - Tokenizer / Extractor
// ==========================================
// Purely syntactic scan of decoded file text: raw (key, value) pairs
// plus candidate curve blocks, in file order. No unit conversion and
// no semantic validation happens here; values stay raw strings.
// A malformed line never aborts the scan, it becomes a note.
// ==========================================

use crate::config::IngestConfig;
use crate::domain::module::ParseWarning;
use crate::parser::error::{ParseError, ParseResult};
use encoding_rs::Encoding;
use std::path::Path;

// ==========================================
// Raw output structures
// ==========================================

/// One `Key = Value` or `Key Value` line, trimmed, untouched otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPair {
    pub line: usize,
    pub key: String,
    pub value: String,
}

/// A candidate curve block: header label plus raw coordinate token rows.
/// Coordinate strings are coerced to numbers by the field mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    pub line: usize,
    pub label: String,
    pub rows: Vec<(String, String)>,
}

/// Everything the tokenizer extracted from one file.
#[derive(Debug, Clone, Default)]
pub struct TokenizedFile {
    pub pairs: Vec<RawPair>,
    pub blocks: Vec<RawBlock>,
    pub notes: Vec<ParseWarning>,
}

impl TokenizedFile {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.blocks.is_empty()
    }
}

// ==========================================
// Tokenizer
// ==========================================
pub struct Tokenizer {
    encodings: Vec<&'static Encoding>,
    encoding_labels: Vec<String>,
    block_markers: Vec<String>, // normalized (lowercase)
}

impl Tokenizer {
    /// Build a tokenizer from validated configuration. Unknown encoding
    /// labels were already rejected by `IngestConfig::validate`.
    pub fn new(config: &IngestConfig) -> Self {
        let encodings = config
            .encoding_fallbacks
            .iter()
            .filter_map(|label| Encoding::for_label(label.as_bytes()))
            .collect();
        Self {
            encodings,
            encoding_labels: config.encoding_fallbacks.clone(),
            block_markers: config
                .block_markers
                .iter()
                .map(|m| m.trim().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Decode raw bytes through the fallback chain.
    ///
    /// Each encoding is tried in order; the first decode without errors
    /// wins. Single-byte fallbacks always succeed, so a chain ending in
    /// one of them never reaches the error case.
    pub fn decode(&self, path: &Path, bytes: &[u8]) -> ParseResult<String> {
        for encoding in &self.encodings {
            let (text, _actual, had_errors) = encoding.decode(bytes);
            if !had_errors {
                return Ok(text.into_owned());
            }
        }
        Err(ParseError::UndecodableContent {
            path: path.display().to_string(),
            tried: self.encoding_labels.join(", "),
        })
    }

    /// Scan decoded text into raw pairs, curve blocks and notes.
    pub fn tokenize(&self, text: &str) -> TokenizedFile {
        let mut out = TokenizedFile::default();
        let mut open_block: Option<RawBlock> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            // Inside a block: capture point rows until something else shows up
            if open_block.is_some() {
                if is_end_marker(line) {
                    if let Some(block) = open_block.take() {
                        out.blocks.push(block);
                    }
                    continue;
                }
                if let Some(row) = parse_point_row(line) {
                    if let Some(block) = open_block.as_mut() {
                        block.rows.push(row);
                    }
                    continue;
                }
                // first non-point line closes the block, then falls through
                if let Some(block) = open_block.take() {
                    out.blocks.push(block);
                }
            }

            if let Some(label) = self.match_block_header(line) {
                open_block = Some(RawBlock {
                    line: line_no,
                    label,
                    rows: Vec::new(),
                });
                continue;
            }

            if let Some((key, value)) = split_pair(line) {
                out.pairs.push(RawPair {
                    line: line_no,
                    key,
                    value,
                });
            } else {
                out.notes.push(ParseWarning::note(
                    format!("line {}", line_no),
                    format!("unparseable line skipped: {}", truncate(line, 60)),
                ));
            }
        }

        if let Some(block) = open_block.take() {
            out.blocks.push(block);
        }

        out
    }

    /// Check whether a line opens a curve block; returns the series label.
    ///
    /// Accepted shapes: `IVCurve_STC`, `IVCurve = STC`, `CurvePoints NOCT`.
    /// Without an explicit label the series defaults to "STC".
    fn match_block_header(&self, line: &str) -> Option<String> {
        let (head, rest) = match line.split_once('=') {
            Some((h, r)) => (h.trim(), r.trim()),
            None => match line.split_once(char::is_whitespace) {
                Some((h, r)) => (h.trim(), r.trim()),
                None => (line, ""),
            },
        };

        let head_lower = head.to_ascii_lowercase();
        for marker in &self.block_markers {
            if let Some(tail) = head_lower.strip_prefix(marker.as_str()) {
                let label = if !rest.is_empty() {
                    rest.to_string()
                } else {
                    let trimmed = tail.trim_start_matches(['_', '-', ' ']);
                    if trimmed.is_empty() {
                        "STC".to_string()
                    } else {
                        // preserve original casing from the untrimmed head
                        head[head.len() - trimmed.len()..].to_string()
                    }
                };
                return Some(label);
            }
        }
        None
    }
}

// ==========================================
// Line-level helpers
// ==========================================

fn is_end_marker(line: &str) -> bool {
    line.to_ascii_lowercase().starts_with("end of")
}

/// Split a `Key = Value` or `Key Value` line. Returns None when the line
/// has no recognizable key part.
fn split_pair(line: &str) -> Option<(String, String)> {
    if let Some((key, value)) = line.split_once('=') {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        return Some((key.to_string(), value.trim().to_string()));
    }
    if let Some((key, value)) = line.split_once(char::is_whitespace) {
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return None;
        }
        return Some((key.to_string(), value.to_string()));
    }
    None
}

/// Recognize a coordinate row: at least two numeric-looking tokens
/// separated by commas or whitespace. `Point_N = v,i` rows are accepted
/// too. Tokens stay raw strings.
fn parse_point_row(line: &str) -> Option<(String, String)> {
    let payload = match line.split_once('=') {
        Some((key, value)) => {
            if key.trim().to_ascii_lowercase().starts_with("point") {
                value
            } else {
                return None;
            }
        }
        None => line,
    };

    let tokens: Vec<&str> = payload
        .split([',', ' ', '\t', ';'])
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.len() < 2 {
        return None;
    }
    if tokens.iter().take(2).all(|t| looks_numeric(t)) {
        Some((tokens[0].to_string(), tokens[1].to_string()))
    } else {
        None
    }
}

/// Cheap shape check, not a parse: sign, digits, one separator, exponent.
fn looks_numeric(token: &str) -> bool {
    let mut seen_digit = false;
    let mut seen_sep = false;
    let mut seen_exp = false;
    for (i, c) in token.char_indices() {
        match c {
            '0'..='9' => seen_digit = true,
            '+' | '-' if i == 0 => {}
            '.' if !seen_sep => seen_sep = true,
            'e' | 'E' if seen_digit && !seen_exp => {
                seen_exp = true;
                seen_sep = true; // no decimal point after the exponent
            }
            '+' | '-' if seen_exp => {}
            _ => return false,
        }
    }
    seen_digit
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let cut = s
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &s[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(&IngestConfig::default())
    }

    #[test]
    fn test_key_value_forms() {
        let text = "PNom = 550\nVoc 49.9\nManufacturer=Jinko Solar\n";
        let out = tokenizer().tokenize(text);
        assert_eq!(out.pairs.len(), 3);
        assert_eq!(out.pairs[0].key, "PNom");
        assert_eq!(out.pairs[0].value, "550");
        assert_eq!(out.pairs[1].key, "Voc");
        assert_eq!(out.pairs[1].value, "49.9");
        assert_eq!(out.pairs[2].value, "Jinko Solar");
        assert!(out.notes.is_empty());
    }

    #[test]
    fn test_unparseable_line_becomes_note() {
        let text = "PNom = 550\n???\nVoc = 49.9\n";
        let out = tokenizer().tokenize(text);
        assert_eq!(out.pairs.len(), 2);
        assert_eq!(out.notes.len(), 1);
        assert!(out.notes[0].field.contains("line 2"));
    }

    #[test]
    fn test_block_capture_with_end_marker() {
        let text = "PNom = 550\nIVCurve_STC\n0.0, 13.9\n10.0 13.8\n20.0,13.5\n30.0, 12.0\nEnd of IVCurve\nVoc = 49.9\n";
        let out = tokenizer().tokenize(text);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].label, "STC");
        assert_eq!(out.blocks[0].rows.len(), 4);
        assert_eq!(out.blocks[0].rows[1], ("10.0".to_string(), "13.8".to_string()));
        // key/value scanning resumes after the block
        assert_eq!(out.pairs.len(), 2);
    }

    #[test]
    fn test_block_closed_by_non_point_line() {
        let text = "CurvePoints NOCT\n0, 10\n1, 9.9\nVoc = 49.9\n";
        let out = tokenizer().tokenize(text);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].label, "NOCT");
        assert_eq!(out.blocks[0].rows.len(), 2);
        assert_eq!(out.pairs.len(), 1);
    }

    #[test]
    fn test_point_n_rows_accepted() {
        let text = "IVCurve = STC\nPoint_1 = 0.0, 13.9\nPoint_2 = 5.0, 13.7\n";
        let out = tokenizer().tokenize(text);
        assert_eq!(out.blocks[0].rows.len(), 2);
    }

    #[test]
    fn test_trailing_open_block_is_kept() {
        let text = "IVCurve_STC\n0, 10\n1, 9\n";
        let out = tokenizer().tokenize(text);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].rows.len(), 2);
    }

    #[test]
    fn test_decode_utf8_then_latin1_fallback() {
        let t = tokenizer();
        // plain ASCII decodes as UTF-8
        let text = t.decode(Path::new("a.pan"), b"PNom = 550").unwrap();
        assert!(text.contains("PNom"));

        // 0xE9 is 'é' in windows-1252/latin-1 but invalid UTF-8
        let bytes = b"Manufacturer = Syst\xE8mes PV";
        let text = t.decode(Path::new("b.pan"), bytes).unwrap();
        assert!(text.contains("Systèmes"));
    }

    #[test]
    fn test_decode_fails_with_utf8_only_chain() {
        let config = IngestConfig {
            encoding_fallbacks: vec!["utf-8".into()],
            ..Default::default()
        };
        let t = Tokenizer::new(&config);
        let result = t.decode(Path::new("c.pan"), b"bad \xE9 bytes");
        assert!(matches!(result, Err(ParseError::UndecodableContent { .. })));
    }

    #[test]
    fn test_looks_numeric() {
        assert!(looks_numeric("13.9"));
        assert!(looks_numeric("-0.5"));
        assert!(looks_numeric("1e-3"));
        assert!(looks_numeric("+2E5"));
        assert!(!looks_numeric("abc"));
        assert!(!looks_numeric("1.2.3"));
        assert!(!looks_numeric(""));
    }
}

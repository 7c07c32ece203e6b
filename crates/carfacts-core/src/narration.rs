//! Turns a markdown report into text that reads naturally when spoken.

use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

const RATING_GLYPHS: &[(char, &str)] = &[
    ('🔴', "poor"),
    ('⚪', "average"),
    ('🟢', "good"),
    ('🟡', "exceptional"),
];
const VARIATION_SELECTOR: char = '\u{FE0F}';

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").unwrap())
}

fn strong_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap())
}

fn star_em_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*([^\s*](?:[^*]*[^\s*])?)\*").unwrap())
}

// Underscores only count as emphasis at word boundaries (not snake_case).
fn underscore_em_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(^|[^\w])_([^\s_](?:[^_]*[^\s_])?)_([^\w]|$)").unwrap())
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#{1,6}\s+(.*?)\s*#*\s*$").unwrap())
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:[-*+]|\d+[.)])\s+(.*)$").unwrap())
}

fn rule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:-[\s-]*-[\s-]*-[\s-]*|\*[\s*]*\*[\s*]*\*[\s*]*|_[\s_]*_[\s_]*_[\s_]*)$").unwrap())
}

fn table_separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\|?\s*:?-+:?\s*(?:\|\s*:?-+:?\s*)*\|?$").unwrap())
}

/// Strips markdown and rating glyphs for text-to-speech.
///
/// Line structure is kept: blank lines survive, separator rows and
/// horizontal rules disappear, headings and list items become sentences.
/// Text without markup is returned unchanged.
pub fn strip_markup_for_narration(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in text.split('\n') {
        if let Some(spoken) = narrate_line(line) {
            out.push(spoken);
        }
    }
    out.join("\n")
}

fn narrate_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Some(line.to_string());
    }

    if trimmed.contains('|') && table_separator_re().is_match(trimmed) && trimmed.contains('-') {
        return None;
    }
    if rule_re().is_match(trimmed) {
        return None;
    }

    if let Some(caps) = heading_re().captures(trimmed) {
        return Some(as_sentence(&strip_inline(&caps[1])));
    }

    if trimmed.starts_with('|') {
        return Some(as_sentence(&join_cells(trimmed)));
    }

    if let Some(caps) = list_item_re().captures(trimmed) {
        return Some(as_sentence(&join_cells(&caps[1])));
    }

    // Rows emitted without the outer pipes.
    if trimmed.contains('|') {
        return Some(as_sentence(&join_cells(trimmed)));
    }

    Some(strip_inline(line))
}

fn join_cells(row: &str) -> String {
    row.trim_matches('|')
        .split('|')
        .map(|cell| strip_inline(cell.trim()))
        .filter(|cell| !cell.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn as_sentence(s: &str) -> String {
    let s = s.trim();
    if s.is_empty() || s.ends_with(['.', '!', '?', ':', ';']) {
        s.to_string()
    } else {
        format!("{}.", s)
    }
}

fn strip_inline(s: &str) -> String {
    let mut s = link_re().replace_all(s, "$1").into_owned();
    s = strong_re().replace_all(&s, "$1$2").into_owned();
    s = s.replace("**", "").replace('`', "");
    s = star_em_re().replace_all(&s, "$1").into_owned();

    // Adjacent matches share a boundary character; repeat until stable.
    loop {
        let next = underscore_em_re().replace_all(&s, "$1$2$3").into_owned();
        if next == s {
            break;
        }
        s = next;
    }

    speak_glyphs(&s)
}

fn speak_glyphs(s: &str) -> String {
    if !s
        .chars()
        .any(|c| c == VARIATION_SELECTOR || RATING_GLYPHS.iter().any(|(g, _)| *g == c))
    {
        return s.to_string();
    }

    let chars: Vec<char> = s.chars().filter(|c| *c != VARIATION_SELECTOR).collect();
    let mut out = String::with_capacity(s.len());
    for (i, c) in chars.iter().enumerate() {
        match RATING_GLYPHS.iter().find(|(g, _)| g == c) {
            Some((_, word)) => {
                if out.chars().last().is_some_and(|p| p.is_alphanumeric()) {
                    out.push(' ');
                }
                out.push_str(word);
                if chars.get(i + 1).is_some_and(|n| n.is_alphanumeric()) {
                    out.push(' ');
                }
            }
            None => out.push(*c),
        }
    }
    out
}

/// Output format a narration sink produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mpeg,
    PlainText,
}

impl AudioFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            AudioFormat::Mpeg => "audio/mpeg",
            AudioFormat::PlainText => "text/plain",
        }
    }
}

/// Receives narration text. Speech synthesis lives behind this trait.
#[async_trait]
pub trait NarrationSink: Send + Sync {
    async fn narrate(&self, text: &str, format: AudioFormat) -> anyhow::Result<()>;
}

/// Writes the narration transcript to a file instead of synthesizing audio.
#[derive(Debug, Clone)]
pub struct TranscriptSink {
    path: PathBuf,
}

impl TranscriptSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl NarrationSink for TranscriptSink {
    async fn narrate(&self, text: &str, format: AudioFormat) -> anyhow::Result<()> {
        if format != AudioFormat::PlainText {
            anyhow::bail!(
                "transcript sink cannot produce {} (only {})",
                format.mime(),
                AudioFormat::PlainText.mime()
            );
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, text).await?;
        tracing::debug!(event = "narration.written", path = %self.path.display(), bytes = text.len());
        Ok(())
    }
}

/// Strips `report` and hands it to `sink`.
pub async fn narrate_report(
    sink: &dyn NarrationSink,
    report: &str,
    format: AudioFormat,
) -> anyhow::Result<()> {
    sink.narrate(&strip_markup_for_narration(report), format).await
}

use html2text::from_read;
use regex::Regex;

use super::splitter::sentences;

/// Text preprocessing applied before splitting.
pub struct TextCleaner {
    url: Regex,
    whitespace: Regex,
    bold: Regex,
    stage_tag: Regex,
    bullet: Regex,
    heading: Regex,
    meta_title: Regex,
    blank_lines: Regex,
    spaces: Regex,
}

impl TextCleaner {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            url: Regex::new(r"https?://[^\s]+")?,
            whitespace: Regex::new(r"\s+")?,
            bold: Regex::new(r"\*\*|__")?,
            stage_tag: Regex::new(r"\[[^\]\n]*\]")?,
            bullet: Regex::new(r"(?m)^[ \t]*[-*][ \t]+")?,
            heading: Regex::new(r"#{1,6}[ \t]?")?,
            meta_title: Regex::new(
                r"(?im)^[ \t]*(title|script|part \d+|scene \d+|narrator|intro|outro):.*$",
            )?,
            blank_lines: Regex::new(r"\n{3,}")?,
            spaces: Regex::new(r"[ \t]{2,}")?,
        })
    }

    /// Converts HTML to plain text, drops URLs and collapses whitespace.
    pub fn strip_markup(&self, text: &str) -> String {
        let plain_text = from_read(text.as_bytes(), usize::MAX);
        let without_urls = self.url.replace_all(&plain_text, "");
        let normalized = self.whitespace.replace_all(&without_urls, " ");
        normalized.trim().to_string()
    }

    /// Removes artifacts a generated script tends to carry: markdown emphasis, bullets and
    /// headings, bracketed stage directions, section labels, and sentences echoed back to back.
    pub fn clean_script(&self, text: &str) -> String {
        let mut result = self.bold.replace_all(text, "").into_owned();
        result = self.stage_tag.replace_all(&result, "").into_owned();
        result = self.bullet.replace_all(&result, "").into_owned();
        result = self.heading.replace_all(&result, "").into_owned();
        result = self.meta_title.replace_all(&result, "").into_owned();

        let deduplicated: Vec<String> = result
            .split('\n')
            .map(drop_repeated_sentences)
            .collect();
        result = deduplicated.join("\n");

        result = self.blank_lines.replace_all(&result, "\n\n").into_owned();
        result = self.spaces.replace_all(&result, " ").into_owned();
        result.trim().to_string()
    }
}

/// Drops a sentence identical to the one right before it (case-insensitive).
fn drop_repeated_sentences(line: &str) -> String {
    let words: Vec<&str> = line.split_whitespace().collect();
    let mut kept: Vec<String> = Vec::new();
    for sentence in sentences(&words) {
        let joined = sentence.join(" ");
        let repeated = kept
            .last()
            .map_or(false, |previous| previous.to_lowercase() == joined.to_lowercase());
        if !repeated {
            kept.push(joined);
        }
    }
    kept.join(" ")
}

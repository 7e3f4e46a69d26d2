/// Word ceiling per chunk for speech models.
pub const TTS_CHUNK_WORDS: usize = 450;
/// Word ceiling per chunk for text-generation models.
pub const TEXT_CHUNK_WORDS: usize = 1000;

const CLOSING_PUNCTUATION: &[char] = &['"', '\'', ')', ']', '\u{201d}', '\u{2019}', '\u{bb}'];

pub fn max_words_for_model(model: &str) -> usize {
    if model.contains("tts") {
        TTS_CHUNK_WORDS
    } else {
        TEXT_CHUNK_WORDS
    }
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

fn ends_with_any(word: &str, terminators: &[char]) -> bool {
    word.trim_end_matches(CLOSING_PUNCTUATION)
        .ends_with(terminators)
}

/// Splits a word run after every word matching `is_boundary`. Boundaries fall between
/// words, so no word is ever cut.
fn split_after<'a>(words: &[&'a str], is_boundary: impl Fn(&str) -> bool) -> Vec<Vec<&'a str>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for &word in words {
        current.push(word);
        if is_boundary(word) {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Deterministic splitter that keeps sentences together while staying under a word ceiling.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSplitter {
    max_words: usize,
}

struct Accumulator<'a> {
    max_words: usize,
    chunks: Vec<String>,
    current: Vec<&'a str>,
}

impl<'a> Accumulator<'a> {
    fn push_group(&mut self, group: &[&'a str]) {
        if !self.current.is_empty() && self.current.len() + group.len() > self.max_words {
            self.flush();
        }
        self.current.extend_from_slice(group);
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.chunks.push(self.current.join(" "));
            self.current.clear();
        }
    }
}

impl ChunkSplitter {
    pub fn new(max_words: usize) -> Self {
        Self {
            max_words: max_words.max(1),
        }
    }

    pub fn for_model(model: &str) -> Self {
        Self::new(max_words_for_model(model))
    }

    pub fn max_words(&self) -> usize {
        self.max_words
    }

    /// Returns ordered, non-empty chunks; whitespace inside chunks is normalized to single spaces.
    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut acc = Accumulator {
            max_words: self.max_words,
            chunks: Vec::new(),
            current: Vec::new(),
        };

        for sentence in sentences(&words) {
            if sentence.len() <= self.max_words {
                acc.push_group(&sentence);
                continue;
            }

            for clause in split_after(&sentence, |w| ends_with_any(w, &[',', ';'])) {
                if clause.len() <= self.max_words {
                    acc.push_group(&clause);
                } else {
                    acc.flush();
                    for piece in clause.chunks(self.max_words) {
                        acc.push_group(piece);
                    }
                }
            }
        }

        acc.flush();
        acc.chunks
    }
}

pub(crate) fn sentences<'a>(words: &[&'a str]) -> Vec<Vec<&'a str>> {
    split_after(words, |w| ends_with_any(w, &['.', '!', '?', '\u{2026}']))
}

/// Checks that every chunk is non-empty and within the ceiling.
pub fn validate_chunks(chunks: &[String], max_words: usize) -> Result<(), String> {
    for (index, chunk) in chunks.iter().enumerate() {
        let words = count_words(chunk);
        if words == 0 {
            return Err(format!("chunk {} is empty", index));
        }
        if words > max_words {
            return Err(format!(
                "chunk {} has {} words, limit is {}",
                index, words, max_words
            ));
        }
    }
    Ok(())
}

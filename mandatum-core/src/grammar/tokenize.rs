//! Input-text tokenization: de-punctuation plus number-word normalization.
//!
//! The match engine never sees raw transcriber output. Text is lowered,
//! stripped of punctuation, split on whitespace, and number words are folded
//! into numeric tokens left-to-right ("one hundred five" → `Int(105)`), so a
//! `Number` requirement can consume a single typed token regardless of how
//! the recognizer spelled it.

use super::Token;

/// Placeholder word recorded for a phrase the transcriber could not decode.
/// It keeps phrase ordering observable but is excluded from open-slot text.
pub const MISS_PLACEHOLDER: &str = "_";

/// Cardinal number words understood by the folder, smallest units first.
const UNITS: &[(&str, i64)] = &[
    ("zero", 0),
    ("o", 0),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
];

const TENS: &[(&str, i64)] = &[
    ("twenty", 20),
    ("thirty", 30),
    ("forty", 40),
    ("fifty", 50),
    ("sixty", 60),
    ("seventy", 70),
    ("eighty", 80),
    ("ninety", 90),
];

const SCALES: &[(&str, i64)] = &[
    ("hundred", 100),
    ("thousand", 1_000),
    ("million", 1_000_000),
    ("billion", 1_000_000_000),
    ("trillion", 1_000_000_000_000),
];

/// The full number-word lexicon, used when deriving a command's
/// full vocabulary for a `Number` slot.
pub fn number_word_lexicon() -> Vec<String> {
    UNITS
        .iter()
        .chain(TENS.iter())
        .chain(SCALES.iter())
        .map(|(w, _)| (*w).to_string())
        .collect()
}

fn unit_value(word: &str) -> Option<i64> {
    UNITS
        .iter()
        .chain(TENS.iter())
        .find(|(w, _)| *w == word)
        .map(|(_, v)| *v)
}

fn scale_value(word: &str) -> Option<i64> {
    SCALES.iter().find(|(w, _)| *w == word).map(|(_, v)| *v)
}

/// Tokenize accumulated phrase text into typed tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            // Apostrophes stay ("today's"), digits and dots stay for numeric
            // literals, underscores stay for the miss placeholder.
            if c.is_alphanumeric() || c == '\'' || c == '.' || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut tokens = Vec::new();
    let mut number_run = NumberRun::default();

    for raw in cleaned.split_whitespace() {
        let word = raw.trim_matches('.');
        if word.is_empty() {
            continue;
        }

        if let Ok(n) = word.parse::<i64>() {
            number_run.flush(&mut tokens);
            tokens.push(Token::Int(n));
            continue;
        }
        if word.contains('.') {
            if let Ok(f) = word.parse::<f64>() {
                number_run.flush(&mut tokens);
                tokens.push(Token::Float(f));
                continue;
            }
        }

        if number_run.accept(word) {
            continue;
        }

        number_run.flush(&mut tokens);
        tokens.push(Token::Word(word.to_string()));
    }

    number_run.flush(&mut tokens);
    tokens
}

/// Left-to-right accumulator for runs of number words.
#[derive(Default)]
struct NumberRun {
    active: bool,
    total: i64,
    current: i64,
}

impl NumberRun {
    /// Try to fold `word` into the run; `true` if it was a number word.
    fn accept(&mut self, word: &str) -> bool {
        if let Some(v) = unit_value(word) {
            self.active = true;
            self.current += v;
            return true;
        }
        if let Some(scale) = scale_value(word) {
            self.active = true;
            if scale == 100 {
                self.current = self.current.max(1) * 100;
            } else {
                self.total += self.current.max(1) * scale;
                self.current = 0;
            }
            return true;
        }
        false
    }

    fn flush(&mut self, tokens: &mut Vec<Token>) {
        if self.active {
            tokens.push(Token::Int(self.total + self.current));
        }
        *self = Self::default();
    }
}

//! Sentence segmentation using the seams library (dialog-aware).

use seams::sentence_detector::dialog_detector::SentenceDetectorDialog;
use std::sync::OnceLock;

/// Global detector instance (lazy initialization). `None` if seams failed to initialize.
static DETECTOR: OnceLock<Option<SentenceDetectorDialog>> = OnceLock::new();

fn get_detector() -> Option<&'static SentenceDetectorDialog> {
    DETECTOR
        .get_or_init(|| match SentenceDetectorDialog::new() {
            Ok(detector) => Some(detector),
            Err(e) => {
                log::warn!("Sentence detector unavailable, using punctuation splitting: {:?}", e);
                None
            }
        })
        .as_ref()
}

/// Split chapter text into sentences for synthesis.
///
/// Never fails; empty or whitespace-only input yields no sentences.
/// Sentences longer than `max_chars` are split at word boundaries so no
/// single request exceeds the engine's input limit. No non-whitespace
/// character is dropped or reordered.
pub fn segment(text: &str, max_chars: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    split_into_sentences(text)
        .into_iter()
        .flat_map(|sentence| {
            if sentence.chars().count() > max_chars {
                split_on_words(&sentence, max_chars)
            } else {
                vec![sentence]
            }
        })
        .filter(|s| !s.trim().is_empty())
        .collect()
}

fn split_into_sentences(text: &str) -> Vec<String> {
    let detected = get_detector().and_then(|detector| {
        match detector.detect_sentences_borrowed(text) {
            Ok(sentences) => Some(
                sentences
                    .iter()
                    .map(|s| s.normalize())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<String>>(),
            ),
            Err(e) => {
                log::warn!("Sentence detection failed, using punctuation splitting: {:?}", e);
                None
            }
        }
    });

    detected.unwrap_or_else(|| split_on_punctuation(text))
}

/// Fallback splitter: break after `.`, `!` or `?` (plus closing quotes) followed by whitespace.
fn split_on_punctuation(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            while let Some(&q) = chars.peek() {
                if matches!(q, '"' | '\'' | ')') {
                    current.push(q);
                    chars.next();
                } else {
                    break;
                }
            }
            if chars.peek().is_none_or(|n| n.is_whitespace()) {
                push_trimmed(&mut sentences, &current);
                current.clear();
            }
        }
    }
    push_trimmed(&mut sentences, &current);

    sentences
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.is_empty() {
        out.push(collapsed);
    }
}

/// Split a long sentence on word boundaries, hard-splitting words that alone exceed the limit.
fn split_on_words(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }
            parts.extend(hard_split(word, max_chars));
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            parts.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

fn hard_split(word: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars.chunks(max_chars).map(|c| c.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(segment("", 250).is_empty());
        assert!(segment("  \n\t  ", 250).is_empty());
    }

    #[test]
    fn test_basic_sentences_in_order() {
        let sentences = segment("First sentence. Second sentence.", 250);
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].contains("First"));
        assert!(sentences[1].contains("Second"));
    }

    #[test]
    fn test_decimal_not_split() {
        let sentences = segment("The tea cost 3.50 dollars. He paid anyway.", 250);
        assert!(sentences.iter().any(|s| s.contains("3.50")));
    }

    #[test]
    fn test_lossless_over_content() {
        let text = "\"Stop!\" she cried. He didn't. Mr. Brown waited\nat the door; nobody came.\n\nThe end.";
        let joined: String = segment(text, 250).concat();
        assert_eq!(squash(&joined), squash(text));
    }

    #[test]
    fn test_long_sentence_split_on_words() {
        let text = "one two three four five six seven eight nine ten eleven twelve.";
        let parts = segment(text, 20);
        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.chars().count() <= 20, "Part too long: {}", part);
        }
        assert_eq!(squash(&parts.concat()), squash(text));
    }

    #[test]
    fn test_split_on_words() {
        assert_eq!(
            split_on_words("one two three four five", 10),
            vec!["one two", "three four", "five"]
        );
    }

    #[test]
    fn test_hard_split_oversized_word() {
        assert_eq!(split_on_words("ab abcdefghij cd", 4), vec!["ab", "abcd", "efgh", "ij", "cd"]);
    }

    #[test]
    fn test_punctuation_fallback() {
        let sentences = split_on_punctuation("Hi there! \"Who is it?\" she asked.  It was 3.5 feet.");
        assert_eq!(
            sentences,
            vec!["Hi there!", "\"Who is it?\"", "she asked.", "It was 3.5 feet."]
        );
    }

    proptest! {
        #[test]
        fn prop_segmentation_is_lossless(
            words in prop::collection::vec("[A-Za-z]{1,9}", 1..40),
            marks in prop::collection::vec(prop::sample::select(vec![" ", ". ", "! ", "? ", ", ", "\n"]), 40),
            max_chars in 8usize..120,
        ) {
            let mut text = String::new();
            for (i, word) in words.iter().enumerate() {
                text.push_str(word);
                text.push_str(marks[i]);
            }
            text.push_str("End.");

            let sentences = segment(&text, max_chars);
            prop_assert_eq!(squash(&sentences.concat()), squash(&text));
            prop_assert!(sentences.iter().all(|s| !s.trim().is_empty()));
        }
    }
}

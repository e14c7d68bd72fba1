//! Text normalisation applied to extracted chapter text.

/// Typographic characters the TTS models mispronounce, with their plain replacements.
const REPLACEMENTS: &[(char, &str)] = &[
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201c}', "\""),
    ('\u{201d}', "\""),
    ('\u{00ab}', "\""),
    ('\u{00bb}', "\""),
    ('\u{2032}', "'"),
    ('\u{2033}', "\""),
    ('\u{2010}', "-"),
    ('\u{2011}', "-"),
    ('\u{2012}', "-"),
    ('\u{2013}', "-"),
    ('\u{2014}', "-"),
    ('\u{2015}', "-"),
    ('\u{2026}', "..."),
    ('\u{00a0}', " "),
    ('\u{202f}', " "),
];

/// Zero-width and byte-order characters, dropped outright.
const INVISIBLE: &[char] = &['\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}', '\u{feff}'];

/// Clean text for narration.
///
/// Replaces smart punctuation, drops control and zero-width characters,
/// collapses runs of spaces (keeping at most one blank line between
/// paragraphs) and collapses runs of periods, which make XTTS emit noise.
pub fn clean_text(text: &str) -> String {
    let mut replaced = String::with_capacity(text.len());

    for c in text.chars() {
        if let Some((_, r)) = REPLACEMENTS.iter().find(|(ch, _)| *ch == c) {
            replaced.push_str(r);
        } else if INVISIBLE.contains(&c) || (c.is_control() && c != '\n' && c != '\t') {
            continue;
        } else {
            replaced.push(c);
        }
    }

    collapse_periods(&collapse_whitespace(&replaced))
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut newlines = 0;

    for c in text.chars() {
        match c {
            '\n' => {
                pending_space = false;
                newlines += 1;
                if newlines <= 2 {
                    // trailing spaces before a line break are dropped
                    while out.ends_with(' ') {
                        out.pop();
                    }
                    out.push('\n');
                }
            }
            ' ' | '\t' => pending_space = newlines == 0,
            _ => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                newlines = 0;
                out.push(c);
            }
        }
    }

    out.trim().to_string()
}

fn collapse_periods(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '.' && out.ends_with('.') {
            continue;
        }
        out.push(c);
    }
    out
}

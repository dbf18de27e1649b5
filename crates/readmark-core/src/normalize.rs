//! Text normalisation shared by the page index and query side.
//!
//! Both forms are idempotent: feeding a normalised string back in returns it
//! unchanged.

use unicode_normalization::UnicodeNormalization;

/// Soft hyphen, zero-width and bidi marks, word joiner, BOM.
pub fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}' | '\u{200B}'..='\u{200F}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
    )
}

/// ASCII and common CJK / full-width punctuation, quotes and brackets.
pub fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '\u{00A1}' | '\u{00A7}' | '\u{00AB}' | '\u{00B6}' | '\u{00B7}' | '\u{00BB}' | '\u{00BF}'
                | '\u{2010}'..='\u{2027}'
                | '\u{2030}'..='\u{205E}'
                | '\u{3001}'..='\u{3003}'
                | '\u{3008}'..='\u{3011}'
                | '\u{3014}'..='\u{301F}'
                | '\u{30FB}'
                | '\u{FE10}'..='\u{FE19}'
                | '\u{FE30}'..='\u{FE4F}'
                | '\u{FF01}'..='\u{FF0F}'
                | '\u{FF1A}'..='\u{FF20}'
                | '\u{FF3B}'..='\u{FF40}'
                | '\u{FF5B}'..='\u{FF65}'
        )
}

/// Strip invisible marks, expand compatibility forms (ligatures such as
/// U+FB01 become `fi`), case-fold and drop all whitespace.
///
/// Spacing accents (U+00A8, U+02D9, ...) expand to a space plus a combining
/// mark; once the space is gone the mark sits on the previous letter, so the
/// result is composed again.
pub fn normalize_full(text: &str) -> String {
    text.chars()
        .filter(|c| !is_invisible(*c))
        .nfkc()
        .flat_map(char::to_lowercase)
        .filter(|c| !c.is_whitespace() && !is_invisible(*c))
        .nfkc()
        .flat_map(char::to_lowercase)
        .collect()
}

/// [`normalize_full`] with punctuation removed as well.
pub fn normalize_no_punct(text: &str) -> String {
    normalize_full(text)
        .chars()
        .filter(|c| !is_punctuation(*c))
        .nfkc()
        .collect()
}

/// Lower-cased key with punctuation, digits and whitespace removed, used to
/// recognise running headers that differ only by page number.
pub fn header_key(text: &str) -> String {
    normalize_no_punct(text)
        .chars()
        .filter(|c| !c.is_numeric())
        .collect()
}

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Drops diacritics: "Café" -> "Cafe". Letters without a decomposition,
/// like "ß", are left as they are.
pub fn fold_accents(s: &str) -> String {
    s.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Collapses runs of whitespace to single spaces and trims the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replaces everything except letters, digits, `&` and whitespace with a
/// space, then collapses whitespace.
pub fn strip_punctuation(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '&' {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&replaced)
}

/// "JOES COFFEE*ROASTERY" -> "Joes Coffee*roastery".
pub fn title_case(s: &str) -> String {
    collapse_whitespace(s)
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

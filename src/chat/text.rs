//! Text normalization shared by detection, keyword search and ingestion.

use std::collections::HashSet;

const HUNGARIAN_STOPWORDS: &[&str] = &[
    "a", "az", "egy", "es", "is", "de", "hogy", "nem", "van", "vagy", "meg", "mar", "csak",
    "mint", "ami", "aki", "ez", "azt", "ezt", "itt", "ott", "mi", "mit", "mik", "ki", "kik",
    "hol", "hogyan", "miert", "melyik", "milyen", "mennyi", "lesz", "lehet", "kell", "fog",
    "kerem", "szeretnek", "tudsz", "tudnal", "tudod", "akkor", "majd", "nekem", "neked",
    "rola", "errol", "arrol", "ebben", "abban", "vannak", "volt", "lenne", "sziasztok",
    "szia", "hello", "koszi", "koszonom", "please", "the", "and", "what", "when", "where",
];

/// Maps Hungarian (and common Latin-1) accented letters to ASCII.
pub fn fold_char(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'ő' | 'õ' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Ő' | 'Õ' => 'O',
        'ú' | 'ù' | 'û' | 'ü' | 'ű' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' | 'Ű' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

/// Lowercase, accent-free, whitespace-collapsed form used for matching.
pub fn normalize(text: &str) -> String {
    let folded: String = text.to_lowercase().chars().map(fold_char).collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_stopword(token: &str) -> bool {
    HUNGARIAN_STOPWORDS.contains(&token)
}

/// Distinct content words of `text` in order of appearance.
pub fn extract_keywords(text: &str, min_len: usize, max_keywords: usize) -> Vec<String> {
    let normalized = normalize(text);
    let mut seen = HashSet::new();
    normalized
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| token.chars().count() >= min_len)
        .filter(|token| !is_stopword(token))
        .filter(|token| seen.insert(token.to_string()))
        .take(max_keywords)
        .map(str::to_string)
        .collect()
}

/// Cuts `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

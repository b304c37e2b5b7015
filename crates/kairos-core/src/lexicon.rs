//! Keyword tables for the heuristic detectors.
//!
//! Every vocabulary the pattern extractor, reflection analyzer and semantic
//! thread builder match against lives here, so the tables can be tuned and
//! tested without touching the scoring code. Bump [`LEXICON_VERSION`] when a
//! table changes meaning.
//!
//! Matching is case-insensitive. Word tables match whole words; phrase
//! tables match at a word start, so "scroll" also hits "scrolling" but not
//! "doomscroll".

use once_cell::sync::Lazy;
use regex::Regex;

pub const LEXICON_VERSION: u32 = 1;

/// Phrases describing getting back on track after a lapse.
pub const RETURN_PHRASES: &[&str] = &["came back", "returned", "got back"];

pub const POSITIVE_WORDS: &[&str] = &["better", "great", "progress", "improved", "good"];

pub const NEGATIVE_WORDS: &[&str] = &["worse", "struggling", "failed", "hard", "difficult"];

pub const EXCUSE_PHRASES: &[&str] = &[
    "didn't have time",
    "too busy",
    "too tired",
    "no time",
    "no energy",
    "not in the mood",
    "forgot",
    "maybe tomorrow",
    "next week",
    "overwhelmed",
];

pub const DISTRACTION_PHRASES: &[&str] = &[
    "scroll",
    "doomscroll",
    "netflix",
    "youtube",
    "instagram",
    "tiktok",
    "twitter",
    "reddit",
    "video games",
    "binge",
];

/// Want / need / obligation markers.
pub const DESIRE_MARKERS: &[&str] = &["want", "need", "should"];

/// Negation / failure markers.
pub const NEGATION_MARKERS: &[&str] = &["but", "didn't", "missed"];

/// Themes recognisable without an LLM, each with its trigger stems.
pub const THEME_LEXICON: &[(&str, &[&str])] = &[
    ("health", &["health", "exercise", "workout", "gym", "diet", "running"]),
    ("sleep", &["sleep", "slept", "insomnia", "bedtime", "tired"]),
    ("work", &["work", "job", "career", "boss", "deadline"]),
    ("relationships", &["partner", "friend", "family", "wife", "husband", "kids"]),
    ("discipline", &["discipline", "routine", "habit", "consisten"]),
    ("purpose", &["purpose", "meaning", "values", "why i"]),
    ("stress", &["stress", "anxious", "anxiety", "pressure", "burnout"]),
    ("money", &["money", "budget", "debt", "savings", "spending"]),
    ("learning", &["learn", "study", "reading", "course"]),
    ("self-worth", &["confidence", "worth", "proud", "ashamed", "guilt"]),
];

fn compile(term: &str, whole_word: bool) -> Regex {
    let escaped = regex::escape(term);
    let pattern = if whole_word {
        format!(r"(?i)\b{}\b", escaped)
    } else {
        format!(r"(?i)\b{}", escaped)
    };
    Regex::new(&pattern).expect("escaped lexicon term is a valid regex")
}

fn table(terms: &'static [&'static str], whole_word: bool) -> Vec<(&'static str, Regex)> {
    terms.iter().map(|t| (*t, compile(t, whole_word))).collect()
}

static RETURN_MATCHERS: Lazy<Vec<(&'static str, Regex)>> =
    Lazy::new(|| table(RETURN_PHRASES, false));
static POSITIVE_MATCHERS: Lazy<Vec<(&'static str, Regex)>> =
    Lazy::new(|| table(POSITIVE_WORDS, true));
static NEGATIVE_MATCHERS: Lazy<Vec<(&'static str, Regex)>> =
    Lazy::new(|| table(NEGATIVE_WORDS, true));
static EXCUSE_MATCHERS: Lazy<Vec<(&'static str, Regex)>> =
    Lazy::new(|| table(EXCUSE_PHRASES, false));
static DISTRACTION_MATCHERS: Lazy<Vec<(&'static str, Regex)>> =
    Lazy::new(|| table(DISTRACTION_PHRASES, false));
static DESIRE_MATCHERS: Lazy<Vec<(&'static str, Regex)>> =
    Lazy::new(|| table(DESIRE_MARKERS, true));
static NEGATION_MATCHERS: Lazy<Vec<(&'static str, Regex)>> =
    Lazy::new(|| table(NEGATION_MARKERS, true));
static THEME_MATCHERS: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    THEME_LEXICON
        .iter()
        .map(|(theme, stems)| (*theme, stems.iter().map(|s| compile(s, false)).collect()))
        .collect()
});

/// Fold typographic apostrophes so "didn’t" matches "didn't".
pub fn normalize(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}'], "'")
}

fn total_hits(matchers: &[(&'static str, Regex)], text: &str) -> usize {
    let text = normalize(text);
    matchers
        .iter()
        .map(|(_, re)| re.find_iter(&text).count())
        .sum()
}

fn any_match(matchers: &[(&'static str, Regex)], text: &str) -> bool {
    let text = normalize(text);
    matchers.iter().any(|(_, re)| re.is_match(&text))
}

fn matched_terms(matchers: &[(&'static str, Regex)], text: &str) -> Vec<&'static str> {
    let text = normalize(text);
    matchers
        .iter()
        .filter(|(_, re)| re.is_match(&text))
        .map(|(term, _)| *term)
        .collect()
}

pub fn contains_return_phrase(text: &str) -> bool {
    any_match(&RETURN_MATCHERS, text)
}

/// Occurrences of positive words.
pub fn positive_hits(text: &str) -> usize {
    total_hits(&POSITIVE_MATCHERS, text)
}

/// Occurrences of negative words.
pub fn negative_hits(text: &str) -> usize {
    total_hits(&NEGATIVE_MATCHERS, text)
}

/// Excuse phrases present in `text`, in table order.
pub fn excuses_in(text: &str) -> Vec<&'static str> {
    matched_terms(&EXCUSE_MATCHERS, text)
}

/// Distraction phrases present in `text`, in table order.
pub fn distractions_in(text: &str) -> Vec<&'static str> {
    matched_terms(&DISTRACTION_MATCHERS, text)
}

pub fn has_desire_marker(text: &str) -> bool {
    any_match(&DESIRE_MATCHERS, text)
}

pub fn has_negation_marker(text: &str) -> bool {
    any_match(&NEGATION_MATCHERS, text)
}

/// Lexicon themes mentioned in `text`, in table order.
pub fn themes_in(text: &str) -> Vec<&'static str> {
    let text = normalize(text);
    THEME_MATCHERS
        .iter()
        .filter(|(_, stems)| stems.iter().any(|re| re.is_match(&text)))
        .map(|(theme, _)| *theme)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_phrases_case_insensitive() {
        assert!(contains_return_phrase("I Came Back to journaling"));
        assert!(contains_return_phrase("finally got back on track"));
        assert!(!contains_return_phrase("I went away"));
    }

    #[test]
    fn test_arc_words_match_whole_words() {
        assert_eq!(positive_hits("good good, great progress"), 4);
        assert_eq!(positive_hits("goodbye"), 0);
        assert_eq!(negative_hits("it was hard, so hard and difficult"), 3);
    }

    #[test]
    fn test_distraction_prefix_matching() {
        assert_eq!(distractions_in("spent the night scrolling"), vec!["scroll"]);
        assert_eq!(distractions_in("doomscrolled again"), vec!["doomscroll"]);
        assert_eq!(distractions_in("Netflix and YouTube"), vec!["netflix", "youtube"]);
    }

    #[test]
    fn test_excuses_with_typographic_apostrophe() {
        assert_eq!(excuses_in("I didn’t have time today"), vec!["didn't have time"]);
        assert!(has_negation_marker("I didn’t"));
    }

    #[test]
    fn test_markers() {
        assert!(has_desire_marker("I should stretch"));
        assert!(!has_desire_marker("shoulder pain"));
        assert!(has_negation_marker("I wanted to, but"));
        assert!(!has_negation_marker("a butter knife"));
    }

    #[test]
    fn test_themes_in() {
        assert_eq!(themes_in("Slept badly, work deadline"), vec!["sleep", "work"]);
        assert!(themes_in("nothing relevant").is_empty());
    }
}

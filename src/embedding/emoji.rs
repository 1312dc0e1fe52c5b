//! Emoji-to-words normalization
//!
//! Embedding models handle pictographs poorly, so a query made only of emoji
//! is rewritten into words before it reaches the embedder. Lexical search
//! always sees the original query.

use regex::Regex;
use std::sync::OnceLock;

/// Fixed symbol→word table. Keys are single scalar values; variation
/// selectors, joiners and skin tone modifiers are ignored during lookup.
const EMOJI_WORDS: &[(char, &str)] = &[
    ('😀', "smile"),
    ('😃', "happy"),
    ('😄', "joy"),
    ('😁', "grin"),
    ('😆', "laugh"),
    ('😅', "awkward laugh"),
    ('🤣', "rolling laughing"),
    ('😂', "laughing tears"),
    ('🙂', "slight smile"),
    ('🙃', "upside down irony"),
    ('😉', "wink"),
    ('😊', "blush"),
    ('😍', "love"),
    ('🥰', "adore"),
    ('😘', "kiss"),
    ('😋', "tasty"),
    ('😜', "silly"),
    ('🤪', "crazy"),
    ('🤔', "thinking"),
    ('🤨', "suspicious"),
    ('😐', "neutral"),
    ('😑', "expressionless"),
    ('😶', "speechless"),
    ('😏', "smirk"),
    ('😒', "unamused"),
    ('🙄', "eye roll"),
    ('😬', "grimace"),
    ('😌', "relieved"),
    ('😔', "pensive"),
    ('😪', "sleepy"),
    ('😴', "sleeping"),
    ('😷', "sick"),
    ('🤯', "mind blown"),
    ('😎', "cool"),
    ('🤓', "nerd"),
    ('😕', "confused"),
    ('😟', "worried"),
    ('😮', "surprised"),
    ('😱', "scream fear"),
    ('😳', "embarrassed"),
    ('🥺', "pleading"),
    ('😢', "sad cry"),
    ('😭', "crying"),
    ('😤', "frustrated"),
    ('😡', "angry"),
    ('🤬', "swearing rage"),
    ('💀', "dead skull"),
    ('🤡', "clown"),
    ('👻', "ghost"),
    ('👽', "alien"),
    ('🤖', "robot"),
    ('💩', "poop"),
    ('😺', "cat"),
    ('🐱', "cat"),
    ('🐈', "cat"),
    ('🐶', "dog"),
    ('🐕', "dog"),
    ('🐸', "frog"),
    ('🐒', "monkey"),
    ('🙈', "monkey see no evil"),
    ('🐷', "pig"),
    ('🐻', "bear"),
    ('🦆', "duck"),
    ('🐍', "snake"),
    ('❤', "love heart"),
    ('💔', "broken heart"),
    ('🔥', "fire"),
    ('💯', "hundred percent"),
    ('👍', "like approve"),
    ('👎', "dislike"),
    ('👏', "applause"),
    ('🙏', "please pray"),
    ('💪', "strong"),
    ('🤝', "handshake"),
    ('🤷', "shrug"),
    ('🤦', "facepalm"),
    ('🎉', "party celebration"),
    ('🎂', "birthday cake"),
    ('🍕', "pizza"),
    ('🍺', "beer"),
    ('☕', "coffee"),
    ('💻', "computer programming"),
    ('📱', "phone"),
    ('💰', "money"),
    ('📚', "study books"),
    ('🏫', "school"),
    ('💼', "work office"),
    ('🚗', "car"),
    ('⚽', "football"),
    ('🎮', "video games"),
    ('🎵', "music"),
    ('☀', "sun summer"),
    ('❄', "winter snow"),
    ('🌧', "rain"),
    ('🎄', "christmas new year"),
    ('🚀', "rocket"),
];

/// Region code spelled by a flag's regional indicators → words
const FLAG_WORDS: &[(&str, &str)] = &[
    ("RU", "russia"),
    ("UA", "ukraine"),
    ("BY", "belarus"),
    ("KZ", "kazakhstan"),
    ("US", "usa america"),
    ("GB", "britain uk"),
    ("CA", "canada"),
    ("DE", "germany"),
    ("FR", "france"),
    ("IT", "italy"),
    ("ES", "spain"),
    ("TR", "turkey"),
    ("CN", "china"),
    ("JP", "japan"),
    ("KR", "korea"),
    ("IN", "india"),
    ("BR", "brazil"),
];

const KEYCAP: char = '\u{20E3}';
const REGIONAL_INDICATORS: std::ops::RangeInclusive<char> = '\u{1F1E6}'..='\u{1F1FF}';

fn pictographic_only() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:[\p{Extended_Pictographic}\p{Emoji_Modifier}\u{1F1E6}-\u{1F1FF}\u{200D}\u{FE0E}\u{FE0F}\s]|[0-9#*]\u{FE0F}?\u{20E3})+$",
        )
        .expect("static emoji pattern is valid")
    })
}

/// True when the query is composed entirely of pictographic symbols
/// (whitespace, joiners and modifiers aside)
pub fn is_pictographic_only(query: &str) -> bool {
    let trimmed = query.trim();
    !trimmed.is_empty()
        && pictographic_only().is_match(trimmed)
        && trimmed.chars().any(is_pictograph)
}

fn is_pictograph(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(c, '\u{200D}' | '\u{FE0E}' | '\u{FE0F}' | KEYCAP)
        && !('\u{1F3FB}'..='\u{1F3FF}').contains(&c)
}

/// Words for the flag made of two regional indicators
fn flag_word(first: char, second: char) -> Option<&'static str> {
    let letter = |c: char| char::from_u32(c as u32 - 0x1F1E6 + u32::from(b'A'));
    let code: String = [letter(first)?, letter(second)?].iter().collect();
    FLAG_WORDS
        .iter()
        .find(|(region, _)| *region == code)
        .map(|(_, word)| *word)
}

/// Length in chars of a keycap sequence (`1️⃣`) at the start of `chars`
fn keycap_len(chars: &[char]) -> Option<usize> {
    match chars {
        [base, '\u{FE0F}', KEYCAP, ..] if is_keycap_base(*base) => Some(3),
        [base, KEYCAP, ..] if is_keycap_base(*base) => Some(2),
        _ => None,
    }
}

fn is_keycap_base(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '#' | '*')
}

fn keycap_word(base: char) -> Option<&'static str> {
    const DIGITS: [&str; 10] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    ];
    match base {
        '#' => Some("hash"),
        '*' => Some("asterisk"),
        _ => base.to_digit(10).map(|d| DIGITS[d as usize]),
    }
}

fn word_for(c: char) -> Option<&'static str> {
    EMOJI_WORDS
        .iter()
        .find(|(emoji, _)| *emoji == c)
        .map(|(_, word)| *word)
}

/// Translate every known pictograph to words. Unknown symbols are dropped,
/// so the result may be empty.
pub fn normalize(query: &str) -> String {
    let chars: Vec<char> = query.chars().collect();
    let mut words: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let (word, consumed) = match (chars.get(i + 1), keycap_len(&chars[i..])) {
            (Some(&next), _)
                if REGIONAL_INDICATORS.contains(&c) && REGIONAL_INDICATORS.contains(&next) =>
            {
                (flag_word(c, next), 2)
            }
            (_, Some(len)) => (keycap_word(c), len),
            _ => (word_for(c), 1),
        };
        i += consumed;

        if let Some(word) = word {
            if words.last() != Some(&word) {
                words.push(word);
            }
        }
    }

    words.join(" ")
}

/// Text to embed for `query`: normalized words for emoji-only queries,
/// the query itself otherwise
pub fn embedding_text(query: &str) -> String {
    if is_pictographic_only(query) {
        normalize(query)
    } else {
        query.trim().to_string()
    }
}

//! Deterministic field extraction and the display-name validation gate.
//!
//! Every function here is pure: raw utterance in, typed value or a
//! [`RejectReason`] out. Nothing here calls the generation service.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::model::{Field, FieldValue, Gender};

/// Why an utterance was rejected for a field. Selects the corrective message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Right shape, out of bounds (too short/long, age out of range).
    Length,
    /// Wrong shape for the field.
    Format,
    /// Could mean more than one thing.
    Ambiguous,
}

/// How sure the extractor is about a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Full,
    /// Close to a known answer; needs a yes/no before committing.
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub value: FieldValue,
    pub confidence: Confidence,
}

impl Extracted {
    fn sure(value: FieldValue) -> Self {
        Self {
            value,
            confidence: Confidence::Full,
        }
    }
}

pub const NAME_MAX_CHARS: usize = 24;
pub const GATE_MAX_CHARS: usize = 40;
pub const AGE_MIN: u16 = 18;
pub const AGE_MAX: u16 = 120;
pub const BIO_MAX_CHARS: usize = 280;

/// Names nobody gets to pick, compared case-insensitively.
const NAME_DENYLIST: &[&str] = &[
    "admin", "administrator", "root", "moderator", "mod", "support", "system", "staff",
    "official", "null", "undefined", "none", "anonymous", "test", "user", "bot", "guest",
    "yes", "no", "oui", "non", "hello", "hi", "hey", "bonjour", "salut", "hola", "hallo",
];

/// Self-introduction prefixes stripped before name validation. Matched only
/// when followed by whitespace or `:`/`,`.
static NAME_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:my name is|my name's|i am|i'm|im|call me|it's|je m'appelle|je suis|moi c'est|c'est|me llamo|mi nombre es|soy|ich heiße|ich heisse|ich bin|mein name ist|меня зовут|я)(?:\s*[:,]\s*|\s+)",
    )
    .expect("name prefix pattern is valid")
});

/// CJK prefixes need no separator.
static NAME_PREFIX_CJK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:我的名字是|我叫|我是|叫我)\s*").expect("cjk prefix pattern is valid")
});

/// Run the extractor for exactly `field`.
pub fn extract(field: Field, text: &str) -> Result<Extracted, RejectReason> {
    match field {
        Field::DisplayName => extract_display_name(text).map(|v| Extracted::sure(FieldValue::DisplayName(v))),
        Field::Age => extract_age(text).map(|v| Extracted::sure(FieldValue::Age(v))),
        Field::GenderId => extract_gender(text).map(|(g, confidence)| Extracted {
            value: FieldValue::GenderId(g),
            confidence,
        }),
        Field::Bio => extract_bio(text).map(|v| Extracted::sure(FieldValue::Bio(v))),
    }
}

pub fn is_cjk_char(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{AC00}'..='\u{D7AF}'
    )
}

/// A name counts as CJK when every letter in it is a CJK character.
pub fn is_cjk(text: &str) -> bool {
    let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(is_cjk_char)
}

fn is_denylisted(name: &str) -> bool {
    let lower = name.to_lowercase();
    NAME_DENYLIST.iter().any(|d| *d == lower)
}

fn strip_name_prefix(text: &str) -> String {
    let text = text.trim().replace('’', "'");
    let text = NAME_PREFIX.replace(&text, "");
    let text = NAME_PREFIX_CJK.replace(&text, "");
    text.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '«' | '»' | '“' | '”' | '「' | '」'))
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | '。' | '！' | ','))
        .trim()
        .to_string()
}

/// displayName: 3–24 printable characters (2–24 for CJK) with at least one
/// letter, not denylisted, not a sentence.
pub fn extract_display_name(text: &str) -> Result<String, RejectReason> {
    if text.contains('\n') {
        return Err(RejectReason::Format);
    }
    let name = strip_name_prefix(text);
    if name.chars().any(char::is_control) {
        return Err(RejectReason::Format);
    }
    if !name.chars().any(char::is_alphabetic) {
        return Err(RejectReason::Format);
    }
    // More than a few words is an answer in prose, not a name.
    if name.split_whitespace().count() > 4 {
        return Err(RejectReason::Format);
    }
    let len = name.chars().count();
    let min = if is_cjk(&name) { 2 } else { 3 };
    if len < min || len > NAME_MAX_CHARS {
        return Err(RejectReason::Length);
    }
    if is_denylisted(&name) {
        return Err(RejectReason::Format);
    }
    Ok(name)
}

/// Bounds applied to a display name from either path before the uniqueness
/// lookup: script-aware minimum, 40-character maximum.
pub fn gate_display_name(name: &str) -> Result<String, RejectReason> {
    let name = name.trim();
    if name.chars().any(char::is_control) || !name.chars().any(char::is_alphabetic) {
        return Err(RejectReason::Format);
    }
    let len = name.chars().count();
    let min = if is_cjk(name) { 2 } else { 3 };
    if len < min || len > GATE_MAX_CHARS {
        return Err(RejectReason::Length);
    }
    if is_denylisted(name) {
        return Err(RejectReason::Format);
    }
    Ok(name.to_string())
}

/// age: the first 1–3 digit integer token, accepted only in 18–120.
pub fn extract_age(text: &str) -> Result<u8, RejectReason> {
    let token = text
        .split(|c: char| !c.is_ascii_digit())
        .find(|t| !t.is_empty() && t.len() <= 3)
        .ok_or(RejectReason::Format)?;
    let age: u16 = token.parse().map_err(|_| RejectReason::Format)?;
    if !(AGE_MIN..=AGE_MAX).contains(&age) {
        return Err(RejectReason::Length);
    }
    u8::try_from(age).map_err(|_| RejectReason::Length)
}

const MALE: &[&str] = &[
    "male", "m", "man", "men", "boy", "guy", "he", "him", "he/him", "masculine",
    "homme", "garçon", "masculin", "h",
    "hombre", "varón", "masculino", "chico",
    "mann", "männlich", "maennlich", "junge",
    "муж", "мужчина", "мужской", "парень", "м",
    "男", "男性", "男生", "男人",
];

const FEMALE: &[&str] = &[
    "female", "f", "woman", "women", "girl", "gal", "she", "her", "she/her", "feminine",
    "femal", "femail", "femle", "woman's",
    "femme", "fille", "féminin", "feminin",
    "mujer", "femenino", "chica",
    "frau", "weiblich", "mädchen", "w",
    "жен", "женщина", "женский", "девушка", "ж",
    "女", "女性", "女生", "女人",
];

const OTHER: &[&str] = &[
    "other", "nb", "non-binary", "nonbinary", "non binary", "enby", "they", "them",
    "they/them", "genderqueer", "genderfluid", "agender",
    "autre", "non-binaire", "non binaire",
    "otro", "otra", "no binario", "no binaria",
    "divers", "andere", "nichtbinär", "nicht-binär",
    "другое", "другой", "небинарный",
    "其他", "其它", "非二元",
];

fn synonyms(gender: Gender) -> &'static [&'static str] {
    match gender {
        Gender::Male => MALE,
        Gender::Female => FEMALE,
        Gender::Other => OTHER,
    }
}

/// Whether `text` is, as a whole, one of the known gender words.
pub fn is_gender_word(text: &str) -> bool {
    let norm = normalize_answer(text);
    Gender::ALL.iter().any(|g| synonyms(*g).contains(&norm.as_str()))
}

/// Map a free-text gender label (model output or a chip) to a gender.
/// Only full-confidence matches are coerced.
pub fn coerce_gender_label(label: &str) -> Option<Gender> {
    match extract_gender(label) {
        Ok((g, Confidence::Full)) => Some(g),
        _ => None,
    }
}

fn normalize_answer(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .replace('’', "'")
        .trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '.' | '!' | '?' | ',' | '"' | '。' | '！' | '？')
        })
        .to_string()
}

/// genderId: tolerant multi-locale synonym and typo matcher.
pub fn extract_gender(text: &str) -> Result<(Gender, Confidence), RejectReason> {
    let norm = normalize_answer(text);
    if norm.is_empty() {
        return Err(RejectReason::Format);
    }
    if let Some(g) = norm.parse::<u8>().ok().and_then(Gender::from_id) {
        return Ok((g, Confidence::Full));
    }

    let tokens: Vec<&str> = norm
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | '(' | ')'))
        .filter(|t| !t.is_empty())
        .collect();

    let exact: Vec<Gender> = Gender::ALL
        .into_iter()
        .filter(|g| {
            synonyms(*g).iter().any(|s| {
                if *s == norm || tokens.contains(s) {
                    return true;
                }
                let cjk = s.chars().any(is_cjk_char);
                (cjk || s.contains(' ')) && norm.contains(s)
            })
        })
        .collect();
    match exact.as_slice() {
        [g] => return Ok((*g, Confidence::Full)),
        [] => {}
        _ => return Err(RejectReason::Ambiguous),
    }

    let fuzzy: Vec<Gender> = Gender::ALL
        .into_iter()
        .filter(|g| {
            tokens.iter().any(|t| {
                let len = t.chars().count();
                len >= 4
                    && synonyms(*g).iter().any(|s| {
                        s.chars().count() >= 4 && {
                            let d = edit_distance(t, s);
                            d == 1 || (d == 2 && len >= 7)
                        }
                    })
            })
        })
        .collect();
    match fuzzy.as_slice() {
        [g] => Ok((*g, Confidence::Moderate)),
        [] => Err(RejectReason::Format),
        _ => Err(RejectReason::Ambiguous),
    }
}

/// bio: 1–280 characters on one line; not a bare number, menu digit or
/// standalone gender word.
pub fn extract_bio(text: &str) -> Result<String, RejectReason> {
    let bio = text.trim();
    if bio.is_empty() {
        return Err(RejectReason::Format);
    }
    if bio.contains('\n') {
        return Err(RejectReason::Format);
    }
    if bio.chars().count() > BIO_MAX_CHARS {
        return Err(RejectReason::Length);
    }
    let bare = bio.trim_matches(|c: char| !c.is_alphanumeric());
    if !bare.is_empty() && bare.chars().all(|c| c.is_ascii_digit()) {
        return Err(RejectReason::Format);
    }
    if !bio.chars().any(char::is_alphabetic) {
        return Err(RejectReason::Format);
    }
    if is_gender_word(bio) {
        return Err(RejectReason::Ambiguous);
    }
    Ok(bio.to_string())
}

/// Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

//! Text preparation ahead of synthesis
//!
//! Normalization turns written forms the phonemizer reads poorly (abbreviations,
//! symbols, ordinals, clock times) into words. Chunking splits the result into
//! sentence-sized pieces so the worker can be interrupted between them.

/// Abbreviations expanded only when they stand as a whole word
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Mr.", "Mister"),
    ("Mrs.", "Misses"),
    ("Ms.", "Miss"),
    ("Dr.", "Doctor"),
    ("Prof.", "Professor"),
    ("Jr.", "Junior"),
    ("Sr.", "Senior"),
    ("St.", "Saint"),
    ("vs.", "versus"),
    ("etc.", "etcetera"),
    ("e.g.", "for example"),
    ("i.e.", "that is"),
    ("approx.", "approximately"),
    ("dept.", "department"),
    ("hrs.", "hours"),
    ("mins.", "minutes"),
    ("secs.", "seconds"),
    ("lbs.", "pounds"),
    ("oz.", "ounces"),
    ("ft.", "feet"),
    ("km.", "kilometers"),
];

const SYMBOLS: &[(char, &str)] = &[
    ('&', " and "),
    ('%', " percent"),
    ('@', " at "),
    ('#', " number "),
    ('$', " dollars "),
    ('€', " euros "),
    ('£', " pounds "),
    ('+', " plus "),
    ('=', " equals "),
];

const ONES: [&str; 20] = [
    "", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Normalize text for synthesis
pub fn normalize_text_for_tts(text: &str) -> String {
    let mut expanded = String::with_capacity(text.len());
    for c in text.chars() {
        match SYMBOLS.iter().find(|(sym, _)| *sym == c) {
            Some((_, word)) => expanded.push_str(word),
            None => expanded.push(c),
        }
    }

    let words: Vec<String> = expanded
        .split_whitespace()
        .map(|word| {
            if let Some((_, full)) = ABBREVIATIONS.iter().find(|(abbr, _)| *abbr == word) {
                return full.to_string();
            }
            expand_ordinal(word).unwrap_or_else(|| expand_time_format(word))
        })
        .collect();

    words
        .join(" ")
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ".,!?;:'-\"".contains(*c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// "21st" -> "twenty-first", keeping trailing punctuation
fn expand_ordinal(word: &str) -> Option<String> {
    let core = word.trim_end_matches(|c: char| c.is_ascii_punctuation());
    let tail = &word[core.len()..];

    let digits_end = core.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let (digits, suffix) = core.split_at(digits_end);
    if !matches!(suffix, "st" | "nd" | "rd" | "th") {
        return None;
    }

    let n: u32 = digits.parse().ok()?;
    let cardinal = number_to_words(n)?;
    Some(format!("{}{}", ordinalize(&cardinal), tail))
}

/// Turn the last word of a cardinal into its ordinal form
fn ordinalize(cardinal: &str) -> String {
    let split = cardinal.rfind([' ', '-']).map(|i| i + 1).unwrap_or(0);
    let (head, last) = cardinal.split_at(split);
    let last = match last {
        "one" => "first".to_string(),
        "two" => "second".to_string(),
        "three" => "third".to_string(),
        "five" => "fifth".to_string(),
        "eight" => "eighth".to_string(),
        "nine" => "ninth".to_string(),
        "twelve" => "twelfth".to_string(),
        w if w.ends_with('y') => format!("{}ieth", &w[..w.len() - 1]),
        w => format!("{}th", w),
    };
    format!("{}{}", head, last)
}

/// Expand clock times within a word ("3:30" -> "three thirty")
fn expand_time_format(text: &str) -> String {
    let mut result = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !c.is_ascii_digit() {
            result.push(c);
            continue;
        }

        let mut hours = String::from(c);
        while let Some(&next) = chars.peek() {
            if !next.is_ascii_digit() {
                break;
            }
            hours.push(next);
            chars.next();
        }

        if chars.peek() != Some(&':') {
            result.push_str(&hours);
            continue;
        }
        chars.next();

        let mut minutes = String::new();
        while let Some(&next) = chars.peek() {
            if !next.is_ascii_digit() || minutes.len() == 2 {
                break;
            }
            minutes.push(next);
            chars.next();
        }

        let spoken = match (hours.parse::<u32>(), minutes.parse::<u32>()) {
            (Ok(h), Ok(m)) if minutes.len() == 2 && h < 24 && m < 60 => {
                let hour = number_to_words(h).unwrap_or_else(|| hours.clone());
                match m {
                    0 => Some(format!("{} o'clock", hour)),
                    1..=9 => Some(format!("{} oh {}", hour, ONES[m as usize])),
                    _ => number_to_words(m).map(|min| format!("{} {}", hour, min)),
                }
            }
            _ => None,
        };

        match spoken {
            Some(words) => result.push_str(&words),
            None => {
                result.push_str(&hours);
                result.push(':');
                result.push_str(&minutes);
            }
        }
    }

    result
}

/// Spell out 0..=999
fn number_to_words(num: u32) -> Option<String> {
    match num {
        0 => Some("zero".to_string()),
        1..=19 => Some(ONES[num as usize].to_string()),
        20..=99 => {
            let (t, o) = ((num / 10) as usize, (num % 10) as usize);
            if o == 0 {
                Some(TENS[t].to_string())
            } else {
                Some(format!("{}-{}", TENS[t], ONES[o]))
            }
        }
        100..=999 => {
            let h = (num / 100) as usize;
            match num % 100 {
                0 => Some(format!("{} hundred", ONES[h])),
                rem => Some(format!("{} hundred {}", ONES[h], number_to_words(rem)?)),
            }
        }
        _ => None,
    }
}

/// Split text into sentence chunks of at most `max_chars` characters
///
/// Sentences end at `.`, `!`, `?`, `;` or a newline. A sentence longer than
/// `max_chars` is broken at whitespace; a single overlong word is kept whole.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c == '\n' {
            push_trimmed(&mut sentences, &current);
            current.clear();
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?' | ';') {
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);

    let mut chunks = Vec::with_capacity(sentences.len());
    for sentence in sentences {
        if sentence.chars().count() <= max_chars {
            chunks.push(sentence);
            continue;
        }

        let mut piece = String::new();
        for word in sentence.split_whitespace() {
            let needed = piece.chars().count() + word.chars().count() + usize::from(!piece.is_empty());
            if !piece.is_empty() && needed > max_chars {
                chunks.push(std::mem::take(&mut piece));
            }
            if !piece.is_empty() {
                piece.push(' ');
            }
            piece.push_str(word);
        }
        if !piece.is_empty() {
            chunks.push(piece);
        }
    }

    chunks
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let trimmed = s.trim();
    // Stray punctuation between sentences carries nothing to say
    if trimmed.chars().any(|c| c.is_alphanumeric()) {
        out.push(trimmed.to_string());
    }
}

/// Char-safe prefix for log lines
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

//! Name normalization helpers.

/// Tokens that start the corporate suffix of a name.
const CORPORATE_SUFFIXES: [&str; 6] = [
    "SA",
    "S/A",
    "LTDA",
    "HOLDING",
    "PARTICIPACOES",
    "PARTICIPAÇÕES",
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `token` begins with `word` followed by a word boundary.
fn starts_with_word(token: &str, word: &str) -> bool {
    token
        .strip_prefix(word)
        .is_some_and(|rest| !rest.starts_with(is_word_char))
}

/// Normalizes a company name for cross-source matching.
///
/// Uppercases, turns `.`, `,` and `-` into spaces, drops everything from the
/// first corporate suffix on (`S.A.`, `S/A`, `LTDA`, `HOLDING`,
/// `PARTICIPAÇÕES`) and collapses whitespace. A suffix in first position is
/// kept. `"WEG S.A."` gives `"WEG"`.
#[must_use]
pub fn normalize_company_name(name: &str) -> String {
    let upper: String = name
        .to_uppercase()
        .chars()
        .map(|c| if matches!(c, '.' | ',' | '-') { ' ' } else { c })
        .collect();
    let tokens: Vec<&str> = upper.split_whitespace().collect();

    let cut = (1..tokens.len())
        .find(|&i| {
            let token = tokens[i];
            CORPORATE_SUFFIXES.iter().any(|s| starts_with_word(token, s))
                || (token == "S" && tokens.get(i + 1).is_some_and(|n| starts_with_word(n, "A")))
        })
        .unwrap_or(tokens.len());

    tokens[..cut].join(" ")
}

/// Whether `identifier` is shaped like a B3 ticker: four letters, one or two
/// digits, optional `.SA` (`WEGE3`, `TAEE11`, `PETR4.SA`).
#[must_use]
pub fn is_market_ticker(identifier: &str) -> bool {
    let clean = identifier.trim().to_uppercase();
    let base = clean.strip_suffix(".SA").unwrap_or(&clean);
    let bytes = base.as_bytes();
    (5..=6).contains(&bytes.len())
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4..].iter().all(u8::is_ascii_digit)
}

/// First four characters of `identifier` when they are all letters.
#[must_use]
pub fn ticker_root(identifier: &str) -> Option<&str> {
    let identifier = identifier.trim();
    let end = identifier.char_indices().nth(4).map_or(identifier.len(), |(i, _)| i);
    let root = &identifier[..end];
    (root.chars().count() == 4 && root.chars().all(char::is_alphabetic)).then_some(root)
}

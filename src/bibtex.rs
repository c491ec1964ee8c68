//! Tolerant BibTeX reader and citation formatting.
//!
//! The reader recovers from malformed entries by skipping ahead to the next
//! `@`, so one broken record never takes down the whole bibliography. Keys
//! that fail to parse simply stay unknown and surface later as flagged
//! citations.

use nom::{
    character::complete::{char, multispace0},
    bytes::complete::take_while1,
    IResult,
};
use std::collections::{BTreeMap, HashMap};

/// One bibliography record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BibEntry {
    /// Citation key, e.g. `knuth1984`.
    pub key: String,
    /// Lowercased entry type, e.g. `article`, `book`.
    pub entry_type: String,
    /// Author names in source order, split on `" and "`.
    pub authors: Vec<String>,
    /// Remaining fields, lowercased names.
    pub fields: BTreeMap<String, String>,
}

impl BibEntry {
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").map(String::as_str)
    }

    pub fn year(&self) -> &str {
        self.fields.get("year").map_or("n.d.", String::as_str)
    }

    /// Short author-year label for inline citations: `Knuth, 1984`,
    /// `Aho and Lam, 2006`, `Aho et al., 2006`.
    pub fn inline_label(&self) -> String {
        let names: Vec<&str> = self.authors.iter().map(|a| last_name(a)).collect();
        let who = match names.as_slice() {
            [] => self.key.clone(),
            [a] => (*a).to_string(),
            [a, b] => format!("{} and {}", a, b),
            [a, ..] => format!("{} et al.", a),
        };
        format!("{}, {}", who, self.year())
    }

    /// Full reference line for the references section.
    pub fn reference_line(&self) -> String {
        let mut out = String::new();
        if !self.authors.is_empty() {
            out.push_str(&self.authors.join(", "));
            out.push_str(". ");
        }
        if let Some(title) = self.title() {
            out.push_str(title);
            out.push_str(". ");
        }
        let venue = self
            .fields
            .get("journal")
            .or_else(|| self.fields.get("booktitle"))
            .or_else(|| self.fields.get("publisher"));
        if let Some(venue) = venue {
            out.push_str(venue);
            if let Some(volume) = self.fields.get("volume") {
                out.push_str(&format!(" {}", volume));
                if let Some(number) = self.fields.get("number") {
                    out.push_str(&format!("({})", number));
                }
            }
            if let Some(pages) = self.fields.get("pages") {
                out.push_str(&format!(":{}", pages.replace("--", "\u{2013}")));
            }
            out.push_str(", ");
        }
        out.push_str(self.year());
        out.push('.');
        if let Some(url) = self.fields.get("url") {
            out.push_str(&format!(" {}", url));
        }
        out
    }
}

/// The bibliography database: citation key to record, loaded once per build
/// and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Bibliography {
    entries: HashMap<String, BibEntry>,
}

impl Bibliography {
    /// Parse BibTeX source. Never fails: unparseable records are skipped.
    pub fn parse(input: &str) -> Self {
        let mut entries = HashMap::new();
        let mut rest = input;

        loop {
            rest = skip_to_entry(rest);
            if rest.is_empty() {
                break;
            }
            match parse_entry(rest) {
                Ok((next, Some(entry))) => {
                    entries.insert(entry.key.clone(), entry);
                    rest = next;
                }
                Ok((next, None)) => rest = next,
                Err(_) => {
                    // Resync on the next record
                    match rest[1..].find('@') {
                        Some(pos) => rest = &rest[pos + 1..],
                        None => break,
                    }
                }
            }
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A copy of `self` with `overlay`'s entries shadowing same-key entries.
    /// Used for chapter-local bibliographies.
    pub fn merged(&self, overlay: &Bibliography) -> Bibliography {
        let mut entries = self.entries.clone();
        for (key, entry) in &overlay.entries {
            entries.insert(key.clone(), entry.clone());
        }
        Bibliography { entries }
    }
}

/// Advance to the next `@`, discarding whitespace and `%` line comments.
fn skip_to_entry(input: &str) -> &str {
    let mut s = input;
    loop {
        s = s.trim_start();
        if let Some(stripped) = s.strip_prefix('%') {
            s = match stripped.find('\n') {
                Some(end) => &stripped[end + 1..],
                None => "",
            };
            continue;
        }
        if s.is_empty() || s.starts_with('@') {
            return s;
        }
        // Stray text between records
        match s.find('@') {
            Some(pos) => return &s[pos..],
            None => return "",
        }
    }
}

fn parse_entry(input: &str) -> IResult<&str, Option<BibEntry>> {
    let (input, _) = char('@')(input)?;
    let (input, entry_type) = take_while1(|c: char| c.is_alphanumeric())(input)?;
    let (input, _) = multispace0(input)?;

    let entry_type = entry_type.to_lowercase();
    if matches!(entry_type.as_str(), "comment" | "preamble" | "string") {
        let (input, _) = skip_balanced_braces(input)?;
        return Ok((input, None));
    }

    let (input, _) = char('{')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, key) = take_while1(is_key_char)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(',')(input)?;
    let (input, fields) = parse_fields(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('}')(input)?;

    let authors = fields
        .get("author")
        .map(|a| split_authors(a))
        .unwrap_or_default();

    Ok((
        input,
        Some(BibEntry {
            key: key.to_string(),
            entry_type,
            authors,
            fields,
        }),
    ))
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
}

fn skip_balanced_braces(input: &str) -> IResult<&str, ()> {
    let (input, _) = char('{')(input)?;
    let mut depth = 1usize;
    for (idx, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[idx + 1..], ()));
                }
            }
            _ => {}
        }
    }
    Ok(("", ()))
}

fn parse_fields(input: &str) -> IResult<&str, BTreeMap<String, String>> {
    let mut fields = BTreeMap::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() || rest.starts_with('}') {
            break;
        }
        let Ok((next, (name, value))) = parse_field(rest) else {
            break;
        };
        fields.insert(name.to_lowercase(), value);
        rest = next.trim_start();
        if let Some(stripped) = rest.strip_prefix(',') {
            rest = stripped;
        }
    }

    Ok((rest, fields))
}

fn parse_field(input: &str) -> IResult<&str, (&str, String)> {
    let (input, _) = multispace0(input)?;
    let (input, name) = take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('=')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, value) = parse_value(input)?;
    Ok((input, (name, value)))
}

fn parse_value(input: &str) -> IResult<&str, String> {
    if input.starts_with('{') {
        parse_braced_value(input)
    } else if input.starts_with('"') {
        parse_quoted_value(input)
    } else {
        let (input, value) = take_while1(|c: char| c.is_alphanumeric())(input)?;
        Ok((input, value.to_string()))
    }
}

fn parse_braced_value(input: &str) -> IResult<&str, String> {
    let (input, _) = char('{')(input)?;
    let mut depth = 1usize;
    for (idx, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[idx + 1..], clean_value(&input[..idx])));
                }
            }
            _ => {}
        }
    }
    Ok(("", clean_value(input)))
}

fn parse_quoted_value(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let mut escaped = false;
    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => return Ok((&input[idx + 1..], clean_value(&input[..idx]))),
            _ => {}
        }
    }
    Ok(("", clean_value(input)))
}

/// Strip protective braces (`{DNA}` sequencing) and collapse whitespace.
fn clean_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                out.push(c);
                escaped = true;
            }
            '{' | '}' => {}
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn split_authors(value: &str) -> Vec<String> {
    value
        .split(" and ")
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

/// Family name of one author, handling both `First Last` and `Last, First`.
fn last_name(author: &str) -> &str {
    if let Some((family, _)) = author.split_once(',') {
        return family.trim();
    }
    author.split_whitespace().last().unwrap_or(author)
}

//! Index text synthesis.
//!
//! Every paper is reduced to one canonical string that is fed to both the
//! embedding encoder and the lexical model. Field weighting is expressed by
//! repetition: the title and the concepts appear twice, everything else once.
//! Any change to the weighting here changes both modalities at the same time.

use crate::models::Paper;

/// Maximum number of authors included in the index text.
pub const MAX_AUTHORS: usize = 5;

/// Maximum number of concepts included in the index text.
pub const MAX_CONCEPTS: usize = 10;

/// Build the canonical index text for a paper.
///
/// Layout: `title title authors concepts concepts venue keywords`, with empty
/// parts skipped and parts joined by single spaces.
pub fn synthesize_index_text(paper: &Paper) -> String {
    let mut parts: Vec<String> = Vec::new();

    let title = paper.title.trim();
    if !title.is_empty() {
        parts.push(title.to_string());
        parts.push(title.to_string());
    }

    let authors = join_nonempty(paper.authors.iter().map(|a| a.name.as_str()), MAX_AUTHORS);
    if !authors.is_empty() {
        parts.push(authors);
    }

    let concepts = join_nonempty(paper.concepts.iter().map(String::as_str), MAX_CONCEPTS);
    if !concepts.is_empty() {
        parts.push(concepts.clone());
        parts.push(concepts);
    }

    if let Some(venue) = paper.venue.as_deref().map(str::trim) {
        if !venue.is_empty() {
            parts.push(venue.to_string());
        }
    }

    let keywords = join_nonempty(paper.keywords.iter().map(String::as_str), usize::MAX);
    if !keywords.is_empty() {
        parts.push(keywords);
    }

    parts.join(" ")
}

fn join_nonempty<'a>(items: impl Iterator<Item = &'a str>, limit: usize) -> String {
    items
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}

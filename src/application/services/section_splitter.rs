//! Section Splitter - Turns a narrative into ordered body sections
//!
//! Branch markup belongs to the interactive reader, not the printed book, so
//! it is stripped before the text is cut. Paragraphs are the preferred unit;
//! when there are too few of them the text is cut by sentences instead.

/// Opening and closing sentinels of every branch block
pub const BRANCH_BLOCKS: [(&str, &str); 3] = [
    ("[CHOICE]", "[/CHOICE]"),
    ("[OUTCOME_A]", "[/OUTCOME_A]"),
    ("[OUTCOME_B]", "[/OUTCOME_B]"),
];

/// Closing punctuation allowed between a terminal and the following space
const CLOSERS: [char; 7] = ['"', '\'', '\u{201D}', '\u{2019}', ')', ']', '\u{00BB}'];

/// Split a narrative into at most `target_count` sections, in narrative order.
///
/// A target of zero is treated as one.
pub fn split_sections(narrative: &str, target_count: usize) -> Vec<String> {
    let target = target_count.max(1);
    let stripped = strip_branch_markup(narrative);

    let paragraphs = paragraphs(&stripped);
    if paragraphs.len() >= target {
        return chunk(paragraphs, target, "\n\n");
    }

    let sentences = sentences(&stripped);
    if sentences.is_empty() {
        return vec![stripped.trim().to_string()];
    }

    chunk(sentences, target, " ")
}

/// Remove every complete branch block. An opening sentinel with no matching
/// close leaves the rest of the text untouched.
pub fn strip_branch_markup(narrative: &str) -> String {
    BRANCH_BLOCKS
        .iter()
        .fold(narrative.to_string(), |text, (open, close)| {
            remove_blocks(&text, open, close)
        })
}

fn remove_blocks(text: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(close) else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &after_open[end + close.len()..];
    }

    out.push_str(rest);
    out
}

/// Paragraphs separated by blank (or whitespace-only) lines
pub fn paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush_paragraph(&mut current, &mut paragraphs);
        } else {
            current.push(line.trim_end());
        }
    }
    flush_paragraph(&mut current, &mut paragraphs);

    paragraphs
}

fn flush_paragraph(current: &mut Vec<&str>, paragraphs: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let paragraph = current.join("\n").trim().to_string();
    if !paragraph.is_empty() {
        paragraphs.push(paragraph);
    }
    current.clear();
}

/// Sentences ending in `.`, `!` or `?` followed by whitespace or end of text.
///
/// Runs of terminals (`?!`, `...`) and closing quotes stay with the sentence.
/// Trailing text without a terminal counts as a final sentence.
pub fn sentences(text: &str) -> Vec<String> {
    let indexed: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < indexed.len() {
        if !is_terminal(indexed[i].1) {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < indexed.len() && (is_terminal(indexed[j].1) || CLOSERS.contains(&indexed[j].1)) {
            j += 1;
        }

        if j == indexed.len() || indexed[j].1.is_whitespace() {
            let end = indexed.get(j).map(|(pos, _)| *pos).unwrap_or(text.len());
            push_sentence(&text[start..end], &mut sentences);
            start = end;
        }
        i = j;
    }
    push_sentence(&text[start..], &mut sentences);

    sentences
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\u{2026}')
}

fn push_sentence(raw: &str, sentences: &mut Vec<String>) {
    let sentence = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
}

/// Group units into `target` contiguous chunks of `len / target`, the last
/// chunk taking the remainder. With fewer units than `target`, each unit is
/// its own chunk.
fn chunk(units: Vec<String>, target: usize, separator: &str) -> Vec<String> {
    if units.len() < target {
        return units;
    }

    let size = units.len() / target;
    (0..target)
        .map(|k| {
            let start = k * size;
            let end = if k + 1 == target { units.len() } else { start + size };
            units[start..end].join(separator)
        })
        .collect()
}

//! Doxygen-style documentation comments.
//!
//! The parser is line based and deliberately forgiving: anything it does not
//! recognize is kept as text in the section it is currently filling.

use crate::types::{Documentation, ParamDirection, ParamDoc};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Brief,
    Detailed,
    Param,
    Return,
}

/// Parse a raw documentation comment into its sections.
#[must_use]
pub fn parse_doc_comment(raw: &str) -> Documentation {
    let mut brief: Option<String> = None;
    let mut detailed: Vec<String> = Vec::new();
    let mut return_doc: Option<String> = None;
    let mut params: Vec<ParamDoc> = Vec::new();
    let mut section = Section::Brief;
    let mut current_param: Option<usize> = None;

    for raw_line in raw.lines() {
        let line = strip_markers(raw_line);

        if line.is_empty() {
            if section == Section::Brief && brief.as_deref().is_some_and(|b| !b.is_empty()) {
                section = Section::Detailed;
            }
            continue;
        }

        let (command, rest) = split_command(line);
        match command {
            Some("brief") => {
                brief = Some(rest.to_string());
                section = Section::Brief;
            }
            Some(cmd) if cmd.starts_with("param") => {
                if let Some(doc) = parse_param(&cmd["param".len()..], rest) {
                    current_param = Some(upsert_param(&mut params, doc));
                }
                section = Section::Param;
            }
            Some("return" | "returns") => {
                return_doc = Some(rest.to_string());
                section = Section::Return;
            }
            Some(_) => {
                section = Section::Detailed;
                detailed.push(line.to_string());
            }
            None => match section {
                Section::Brief => append(&mut brief, line),
                Section::Detailed => detailed.push(line.to_string()),
                Section::Param => {
                    if let Some(param) = current_param.and_then(|i| params.get_mut(i)) {
                        push_words(&mut param.description, line);
                    }
                }
                Section::Return => append(&mut return_doc, line),
            },
        }
    }

    Documentation {
        raw_comment: raw.to_string(),
        brief,
        detailed: (!detailed.is_empty()).then(|| detailed.join("\n")),
        return_doc,
        params,
    }
}

/// Remove comment openers, leading stars and a trailing `*/`.
fn strip_markers(line: &str) -> &str {
    let body = line.trim_start_matches(|c: char| c.is_whitespace() || c == '*' || c == '/');
    let opened = body.len() < line.len() && line[..line.len() - body.len()].contains('/');
    let body = if opened {
        body.strip_prefix('!').unwrap_or(body)
    } else {
        body
    };
    let body = body.trim_end();
    body.strip_suffix("*/").unwrap_or(body).trim()
}

/// Split a `@cmd rest` or `\cmd rest` line into the command word and the
/// remaining text.
fn split_command(line: &str) -> (Option<&str>, &str) {
    let Some(body) = line.strip_prefix('@').or_else(|| line.strip_prefix('\\')) else {
        return (None, line);
    };
    match body.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (Some(cmd), rest.trim()),
        None => (Some(body), ""),
    }
}

/// Parse what follows `@param`: an optional `[dir]` tag (attached to the
/// command or as its own word), the name, then the description.
fn parse_param(attached: &str, rest: &str) -> Option<ParamDoc> {
    let mut words = rest.split_whitespace().peekable();

    let mut direction = attached
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .and_then(ParamDirection::from_tag);
    if attached.is_empty() {
        if let Some(tag) = words.peek().and_then(|w| w.strip_prefix('[')) {
            direction = ParamDirection::from_tag(tag.trim_end_matches(']'));
            words.next();
        }
    }

    let name = words.next()?;
    Some(ParamDoc {
        name: name.to_string(),
        description: words.collect::<Vec<_>>().join(" "),
        direction,
    })
}

/// Record a parameter; a second entry for the same name replaces the first
/// in place.
fn upsert_param(params: &mut Vec<ParamDoc>, doc: ParamDoc) -> usize {
    if let Some(i) = params.iter().position(|p| p.name == doc.name) {
        params[i] = doc;
        i
    } else {
        params.push(doc);
        params.len() - 1
    }
}

fn append(target: &mut Option<String>, line: &str) {
    match target {
        Some(text) => push_words(text, line),
        None => *target = Some(line.to_string()),
    }
}

fn push_words(text: &mut String, line: &str) {
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(line);
}

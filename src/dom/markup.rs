//! Lenient tokenizer for the HTML and inline SVG the viewer page and the keymap module produce.
//!
//! This is not a conforming HTML parser. It splits markup into tags, text and comments, keeps
//! tag name case (SVG needs `linearGradient`), decodes attribute values and leaves text
//! exactly as written so it can be serialised back unchanged.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartTag {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    EndTag(String),
    /// Raw text, entities untouched
    Text(String),
    Comment(String),
    /// `<!DOCTYPE ...>` and other `<!...>` declarations, without the brackets
    Declaration(String),
}

pub const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

// Elements whose content is taken verbatim up to the matching end tag
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(name))
}

fn is_raw_text_element(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|raw| raw.eq_ignore_ascii_case(name))
}

pub fn tokenize(markup: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = markup;

    while !rest.is_empty() {
        let Some(open) = rest.find('<') else {
            tokens.push(Token::Text(rest.to_string()));
            break;
        };

        if open > 0 {
            tokens.push(Token::Text(rest[..open].to_string()));
            rest = &rest[open..];
        }

        if let Some(after) = rest.strip_prefix("<!--") {
            let (comment, remaining) = match after.find("-->") {
                Some(end) => (&after[..end], &after[end + 3..]),
                None => (after, ""),
            };
            tokens.push(Token::Comment(comment.to_string()));
            rest = remaining;
            continue;
        }

        if let Some(after) = rest.strip_prefix("<!") {
            let (declaration, remaining) = split_at_close(after);
            tokens.push(Token::Declaration(declaration.to_string()));
            rest = remaining;
            continue;
        }

        if let Some(after) = rest.strip_prefix("</") {
            let (inside, remaining) = split_at_close(after);
            let name = inside.trim().to_string();
            if !name.is_empty() {
                tokens.push(Token::EndTag(name));
            }
            rest = remaining;
            continue;
        }

        let after = &rest[1..];
        if !after.starts_with(|c: char| c.is_ascii_alphabetic()) {
            // A lone '<' in text
            tokens.push(Token::Text("<".to_string()));
            rest = after;
            continue;
        }

        let (inside, remaining) = split_start_tag(after);
        let (name, attributes, self_closing) = parse_start_tag(inside);
        rest = remaining;

        let raw_text = !self_closing && is_raw_text_element(&name);
        tokens.push(Token::StartTag {
            name: name.clone(),
            attributes,
            self_closing,
        });

        if raw_text {
            let end = find_end_tag(rest, &name).unwrap_or(rest.len());
            if end > 0 {
                tokens.push(Token::Text(rest[..end].to_string()));
            }
            rest = &rest[end..];
        }
    }

    tokens
}

fn split_at_close(text: &str) -> (&str, &str) {
    match text.find('>') {
        Some(end) => (&text[..end], &text[end + 1..]),
        None => (text, ""),
    }
}

// Like split_at_close, but a '>' inside a quoted attribute value does not end the tag
fn split_start_tag(text: &str) -> (&str, &str) {
    let mut quote: Option<char> = None;

    for (index, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return (&text[..index], &text[index + 1..]),
            (None, _) => {}
        }
    }

    (text, "")
}

fn find_end_tag(text: &str, name: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();
    let needle = format!("</{}", name.to_ascii_lowercase());
    lower.find(&needle)
}

fn parse_start_tag(inside: &str) -> (String, Vec<Attribute>, bool) {
    let mut body = inside.trim_end();
    let self_closing = body.ends_with('/');
    if self_closing {
        body = &body[..body.len() - 1];
    }

    let name_end = body
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(body.len());
    let name = body[..name_end].to_string();

    (name, parse_attributes(&body[name_end..]), self_closing)
}

fn parse_attributes(text: &str) -> Vec<Attribute> {
    let mut attributes = Vec::new();
    let mut chars = text.char_indices().peekable();

    loop {
        while chars
            .peek()
            .is_some_and(|(_, c)| c.is_whitespace() || *c == '/')
        {
            chars.next();
        }

        let Some(&(start, _)) = chars.peek() else {
            break;
        };

        let mut name_end = text.len();
        while let Some(&(index, c)) = chars.peek() {
            if c.is_whitespace() || c == '=' || c == '/' {
                name_end = index;
                break;
            }
            chars.next();
        }
        let name = text[start..name_end].to_string();

        while chars.peek().is_some_and(|(_, c)| c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek().is_some_and(|(_, c)| *c == '=') {
            chars.next();
            while chars.peek().is_some_and(|(_, c)| c.is_whitespace()) {
                chars.next();
            }

            match chars.peek().copied() {
                Some((quote_index, quote @ ('"' | '\''))) => {
                    chars.next();
                    let value_start = quote_index + 1;
                    let mut value_end = text.len();
                    for (index, c) in chars.by_ref() {
                        if c == quote {
                            value_end = index;
                            break;
                        }
                    }
                    value = decode_entities(&text[value_start..value_end]);
                }
                Some((value_start, _)) => {
                    let mut value_end = text.len();
                    while let Some(&(index, c)) = chars.peek() {
                        if c.is_whitespace() {
                            value_end = index;
                            break;
                        }
                        chars.next();
                    }
                    value = decode_entities(&text[value_start..value_end]);
                }
                None => {}
            }
        }

        if !name.is_empty() {
            attributes.push(Attribute { name, value });
        }
    }

    attributes
}

pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let Some(semi) = rest.find(';').filter(|semi| *semi <= 10) else {
            decoded.push('&');
            rest = &rest[1..];
            continue;
        };

        let entity = &rest[1..semi];
        let character = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };

        match character {
            Some(c) => {
                decoded.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                decoded.push('&');
                rest = &rest[1..];
            }
        }
    }

    decoded.push_str(rest);
    decoded
}

pub fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
#[path = "tests/markup_tests.rs"]
mod tests;

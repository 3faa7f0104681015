use super::{Attribute, Token, decode_entities, escape_attribute, tokenize};

fn start(name: &str, attributes: &[(&str, &str)], self_closing: bool) -> Token {
    Token::StartTag {
        name: name.to_string(),
        attributes: attributes
            .iter()
            .map(|(name, value)| Attribute {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect(),
        self_closing,
    }
}

#[test]
fn svg_groups_keep_their_case_and_attributes() {
    let tokens = tokenize(r#"<svg viewBox="0 0 10 10"><g id="layer0" visibility='hidden'><path d="M0 0"/></g></svg>"#);

    assert_eq!(
        tokens,
        vec![
            start("svg", &[("viewBox", "0 0 10 10")], false),
            start("g", &[("id", "layer0"), ("visibility", "hidden")], false),
            start("path", &[("d", "M0 0")], true),
            Token::EndTag("g".to_string()),
            Token::EndTag("svg".to_string()),
        ]
    );
}

#[test]
fn unquoted_and_bare_attributes() {
    let tokens = tokenize("<input type=radio checked name=source>");
    assert_eq!(
        tokens,
        vec![start(
            "input",
            &[("type", "radio"), ("checked", ""), ("name", "source")],
            false
        )]
    );
}

#[test]
fn quoted_greater_than_does_not_end_the_tag() {
    let tokens = tokenize(r#"<a title="a > b">x</a>"#);
    assert_eq!(tokens[0], start("a", &[("title", "a > b")], false));
    assert_eq!(tokens[1], Token::Text("x".to_string()));
}

#[test]
fn textarea_content_is_raw_text() {
    let tokens = tokenize("<textarea id=kmtext><b>not a tag</b></TEXTAREA>after");
    assert_eq!(
        tokens,
        vec![
            start("textarea", &[("id", "kmtext")], false),
            Token::Text("<b>not a tag</b>".to_string()),
            Token::EndTag("TEXTAREA".to_string()),
            Token::Text("after".to_string()),
        ]
    );
}

#[test]
fn comments_and_declarations() {
    let tokens = tokenize("<!DOCTYPE html><!-- note --><p>1 < 2</p>");
    assert_eq!(tokens[0], Token::Declaration("DOCTYPE html".to_string()));
    assert_eq!(tokens[1], Token::Comment(" note ".to_string()));
    assert_eq!(tokens[2], start("p", &[], false));
    assert_eq!(tokens[3], Token::Text("1 ".to_string()));
    assert_eq!(tokens[4], Token::Text("<".to_string()));
    assert_eq!(tokens[5], Token::Text(" 2".to_string()));
}

#[test]
fn entities_decode_and_attributes_escape() {
    assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#65;&#x42;"), "a & b <c> AB");
    assert_eq!(decode_entities("AT&T; fish & chips"), "AT&T; fish & chips");
    assert_eq!(escape_attribute(r#"say "hi" & go"#), "say &quot;hi&quot; &amp; go");
}

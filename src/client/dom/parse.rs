/**
 * HTML Parser
 *
 * A small tolerant parser producing `Node` trees from server-rendered pages.
 * It understands void elements, raw-text elements (`script`, `style`,
 * `textarea`, `title`), quoted/unquoted/boolean attributes and the common
 * character references. Comments and doctypes are skipped. Stray closing
 * tags are ignored and unclosed elements are closed at the end of input.
 *
 * It is not a full HTML5 tree builder; it only has to read what
 * the page layer writes.
 */

use crate::client::dom::node::{is_raw_text, is_void, Element, Node};
use crate::client::error::ClientError;

/// Deepest element nesting a payload may have
pub const MAX_DEPTH: usize = 512;

/// Parse a full page; the result is the single top-level element, or an
/// `html` element wrapping the top-level nodes when there is not exactly one
pub fn parse_document(html: &str) -> Result<Node, ClientError> {
    let mut nodes = parse_fragment(html)?;
    nodes.retain(|node| !matches!(node, Node::Text(text) if text.trim().is_empty()));

    if nodes.len() == 1 && matches!(nodes[0], Node::Element(_)) {
        return Ok(nodes.remove(0));
    }
    let mut wrapper = Element::new("html");
    wrapper.children = nodes;
    Ok(Node::Element(wrapper))
}

/// Parse a sequence of sibling nodes
pub fn parse_fragment(html: &str) -> Result<Vec<Node>, ClientError> {
    Parser { input: html, pos: 0 }.run()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

/// An element still waiting for its closing tag
struct Open {
    element: Element,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn run(mut self) -> Result<Vec<Node>, ClientError> {
        let mut top: Vec<Node> = Vec::new();
        let mut stack: Vec<Open> = Vec::new();

        while self.pos < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.pos += rest.find("-->").map(|end| end + 3).unwrap_or(rest.len());
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.pos += rest.find('>').map(|end| end + 1).unwrap_or(rest.len());
            } else if rest.starts_with("</") {
                let tag = self.closing_tag();
                close(&mut stack, &mut top, &tag);
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                let (element, self_closing) = self.opening_tag()?;
                if is_raw_text(&element.tag) && !self_closing {
                    let element = self.raw_text(element);
                    push(&mut stack, &mut top, Node::Element(element));
                } else if is_void(&element.tag) || self_closing {
                    push(&mut stack, &mut top, Node::Element(element));
                } else if stack.len() >= MAX_DEPTH {
                    return Err(ClientError::malformed(format!(
                        "elements nested deeper than {}",
                        MAX_DEPTH
                    )));
                } else {
                    stack.push(Open { element });
                }
            } else {
                let end = rest
                    .char_indices()
                    .skip(1)
                    .find(|(_, c)| *c == '<')
                    .map(|(i, _)| i)
                    .unwrap_or(rest.len());
                let text = decode_entities(&rest[..end]);
                self.pos += end;
                push(&mut stack, &mut top, Node::Text(text));
            }
        }

        while let Some(open) = stack.pop() {
            push(&mut stack, &mut top, Node::Element(open.element));
        }
        Ok(top)
    }

    fn closing_tag(&mut self) -> String {
        let rest = self.rest();
        let end = rest.find('>').unwrap_or(rest.len());
        let tag = rest[2..end].trim().to_ascii_lowercase();
        self.pos += (end + 1).min(rest.len());
        tag
    }

    /// Parse `<tag attr=...>`; returns the element and whether it ended in `/>`
    fn opening_tag(&mut self) -> Result<(Element, bool), ClientError> {
        self.pos += 1;
        let name = self.take_while(|c| !c.is_whitespace() && c != '>' && c != '/');
        let mut element = Element::new(name);

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(ClientError::malformed(format!("unterminated <{}> tag", element.tag)));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok((element, true));
            }
            if rest.starts_with('>') {
                self.pos += 1;
                return Ok((element, false));
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }

            let name = self
                .take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
                .to_ascii_lowercase();
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.attribute_value()?
            } else {
                String::new()
            };
            if !name.is_empty() && element.attribute(&name).is_none() {
                element.attributes.push((name, value));
            }
        }
    }

    fn attribute_value(&mut self) -> Result<String, ClientError> {
        let rest = self.rest();
        match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let end = rest[1..]
                    .find(quote)
                    .ok_or_else(|| ClientError::malformed("unterminated attribute value"))?;
                let raw = &rest[1..end + 1];
                self.pos += end + 2;
                Ok(decode_entities(raw))
            }
            _ => {
                let raw = self.take_while(|c| !c.is_whitespace() && c != '>');
                Ok(decode_entities(raw))
            }
        }
    }

    /// Everything up to the matching close tag, as a single text child
    fn raw_text(&mut self, mut element: Element) -> Element {
        let rest = self.rest();
        let closing = format!("</{}", element.tag);
        let end = find_ascii_case_insensitive(rest, &closing).unwrap_or(rest.len());
        let body = &rest[..end];
        if !body.is_empty() {
            let text = match element.tag.as_str() {
                "textarea" | "title" => decode_entities(body),
                _ => body.to_string(),
            };
            element.children.push(Node::Text(text));
        }
        self.pos += end;
        if self.pos < self.input.len() {
            self.closing_tag();
        }
        element
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, keep: F) -> &'a str {
        let rest = self.rest();
        let end = rest.find(|c: char| !keep(c)).unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }
}

fn push(stack: &mut [Open], top: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(open) => open.element.children.push(node),
        None => top.push(node),
    }
}

fn close(stack: &mut Vec<Open>, top: &mut Vec<Node>, tag: &str) {
    let Some(position) = stack.iter().rposition(|open| open.element.tag == tag) else {
        return;
    };
    while stack.len() > position {
        if let Some(open) = stack.pop() {
            push(stack, top, Node::Element(open.element));
        }
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Decode named and numeric character references
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity.strip_prefix('#').and_then(|number| {
                    let code = match number.strip_prefix(|c| c == 'x' || c == 'X') {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => number.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, end + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_page() {
        let html = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>A &amp; B</title></head>\
                    <body><!-- hi --><ul id=posts><li key=\"p-1\">x &lt; y</li></ul>\
                    <form data-skip-morph><input name='a' disabled/></form></body></html>";
        let node = parse_document(html).unwrap();

        let expected: Node = Element::new("html")
            .child(
                Element::new("head")
                    .child(Element::new("meta").attr("charset", "utf-8"))
                    .child(Element::new("title").text("A & B")),
            )
            .child(
                Element::new("body")
                    .child(
                        Element::new("ul")
                            .attr("id", "posts")
                            .child(Element::new("li").attr("key", "p-1").text("x < y")),
                    )
                    .child(
                        Element::new("form")
                            .attr("data-skip-morph", "")
                            .child(Element::new("input").attr("name", "a").attr("disabled", "")),
                    ),
            )
            .into();
        assert_eq!(node, expected);
    }

    #[test]
    fn test_raw_text_keeps_markup() {
        let nodes = parse_fragment("<script>if (a<b) { x = '</p>'; }</script><p>after</p>").unwrap();
        assert_eq!(
            nodes[0],
            Node::Element(Element::new("script").text("if (a<b) { x = '</p>'; }"))
        );
        assert_eq!(nodes[1], Node::Element(Element::new("p").text("after")));
    }

    #[test]
    fn test_unclosed_and_stray_tags() {
        let nodes = parse_fragment("<div><p>one</span></div><b>two").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Element(Element::new("div").child(Element::new("p").text("one"))),
                Node::Element(Element::new("b").text("two")),
            ]
        );
    }

    #[test]
    fn test_nesting_is_capped() {
        let within = format!("{}x{}", "<div>".repeat(MAX_DEPTH), "</div>".repeat(MAX_DEPTH));
        assert!(parse_document(&within).is_ok());

        let deep = "<div>".repeat(100_000);
        let err = parse_document(&deep).unwrap_err();
        assert!(matches!(err, ClientError::MalformedPayload(_)), "{err}");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("&lt;&#65;&#x42;&unknown; & &amp"), "<AB&unknown; & &amp");
    }

    #[test]
    fn test_serialized_page_reparses_equal() {
        let html = "<html><body><p class=\"a&quot;b\">1 &amp; 2</p><br></body></html>";
        let node = parse_document(html).unwrap();
        assert_eq!(parse_document(&node.to_html()).unwrap(), node);
    }
}

//! Builds the abstract node tree from the token stream.
//!
//! Single pass, no mutable state visible outside the call, and no partial
//! tree on failure: the first error aborts the parse.

use crate::parse_util::{ParseError, ParseSourceSpan};

use super::ast::{AttrValue, Attribute, Child, Element, Text};
use super::lexer::{Lexer, Token, TokenKind};

/// Parse markup text into its root element.
///
/// The document must contain exactly one root element; whitespace-only text
/// outside tags is insignificant and dropped.
pub fn parse(source: &str) -> Result<Element, ParseError> {
    let mut parser = TreeBuilder { lexer: Lexer::new(source) };
    let root = parser.parse_document()?;
    Ok(root)
}

struct TreeBuilder<'a> {
    lexer: Lexer<'a>,
}

impl<'a> TreeBuilder<'a> {
    fn parse_document(&mut self) -> Result<Element, ParseError> {
        let mut root = None;
        loop {
            let token = self.lexer.next_token()?;
            match token.kind {
                TokenKind::Text(text) => {
                    if !text.trim().is_empty() {
                        return Err(ParseError::new(token.span, "text outside of the root element"));
                    }
                }
                TokenKind::TagOpen(tag) => {
                    if root.is_some() {
                        return Err(ParseError::new(
                            token.span,
                            "document must have a single root element",
                        ));
                    }
                    root = Some(self.parse_element(tag, token.span)?);
                }
                TokenKind::Eof => break,
                _ => return Err(ParseError::new(token.span, "unexpected token at document level")),
            }
        }
        root.ok_or_else(|| {
            ParseError::new(ParseSourceSpan::empty(crate::parse_util::ParseLocation::start()),
                "empty document")
        })
    }

    /// Called with the `TagOpen` already consumed; finishes attributes,
    /// children and the matching close tag.
    fn parse_element(&mut self, tag: String, open_span: ParseSourceSpan) -> Result<Element, ParseError> {
        let mut attributes: Vec<Attribute> = Vec::new();
        let self_closing = loop {
            let token = self.lexer.next_token()?;
            match token.kind {
                TokenKind::Attr { name, value } => {
                    if attributes.iter().any(|a| a.name == name) {
                        return Err(ParseError::new(
                            token.span,
                            format!("duplicate attribute `{name}` on `{tag}`"),
                        ));
                    }
                    attributes.push(Attribute {
                        name,
                        value: AttrValue::classify(&value),
                        span: token.span,
                    });
                }
                TokenKind::TagOpenEnd { self_closing } => break self_closing,
                _ => return Err(ParseError::new(token.span, "unexpected token inside tag")),
            }
        };

        let mut children: Vec<Child> = Vec::new();
        let mut end = open_span.end;
        if !self_closing {
            loop {
                let token = self.lexer.next_token()?;
                end = token.span.end;
                match token.kind {
                    TokenKind::Text(text) => {
                        if !text.trim().is_empty() {
                            children.push(Child::Text(Text { value: text, span: token.span }));
                        }
                    }
                    TokenKind::TagOpen(child_tag) => {
                        children.push(Child::Element(self.parse_element(child_tag, token.span)?));
                    }
                    TokenKind::TagClose(close_tag) => {
                        if close_tag != tag {
                            return Err(ParseError::new(
                                token.span,
                                format!("mismatched closing tag `</{close_tag}>`, expected `</{tag}>`"),
                            ));
                        }
                        break;
                    }
                    TokenKind::Eof => {
                        return Err(ParseError::new(token.span, format!("unclosed element `<{tag}>`")));
                    }
                    _ => return Err(ParseError::new(token.span, "unexpected token in element content")),
                }
            }
        }

        Ok(Element {
            tag,
            attributes,
            children,
            span: ParseSourceSpan::new(open_span.start, end),
        })
    }
}

//! Parse Module
//!
//! Source-preserving parser for curly-brace templates embedded in HTML.
//! Every node records the byte span it was read from so the printer can
//! reproduce untouched regions exactly.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use crate::ast::{
    AttrNode, AttrValue, Block, BlockStatement, CommentStatement, ConcatPart, ConcatStatement,
    ElementModifierStatement, ElementNode, Expression, Hash, HashPair, Literal,
    LiteralExpression, MustacheCommentStatement, MustacheStatement, PathExpression,
    SourceLocation, Span, Statement, StripFlags, SubExpression, Template, TextNode,
};
use crate::error::CodemodError;

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN PATTERNS
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"^-?[0-9]+(?:\.[0-9]+)?").unwrap();
    static ref PATH_RE: Regex = Regex::new(r#"^[^\s=~}(){|'"]+"#).unwrap();
    static ref HASH_KEY_RE: Regex = Regex::new(r#"^([^\s=~}(){|'"]+)\s*="#).unwrap();
    static ref BLOCK_PARAMS_RE: Regex = Regex::new(r"^as\s+\|").unwrap();
    static ref TAG_NAME_RE: Regex = Regex::new(r"^[A-Za-z@:_][^\s/>]*").unwrap();
    static ref ATTR_NAME_RE: Regex = Regex::new(r#"^[^\s=/>'"{]+"#).unwrap();
    static ref UNQUOTED_VALUE_RE: Regex = Regex::new(r#"^[^\s>'"]+"#).unwrap();
    static ref ELSE_TAG_RE: Regex = Regex::new(r"^\{\{~?\s*else(?:\s|~|\}\})").unwrap();
    static ref CLOSE_BLOCK_RE: Regex = Regex::new(r"^\{\{~?\s*/").unwrap();

    /// HTML void elements never have children or an end tag.
    static ref VOID_TAGS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("area");
        s.insert("base");
        s.insert("br");
        s.insert("col");
        s.insert("command");
        s.insert("embed");
        s.insert("hr");
        s.insert("img");
        s.insert("input");
        s.insert("keygen");
        s.insert("link");
        s.insert("meta");
        s.insert("param");
        s.insert("source");
        s.insert("track");
        s.insert("wbr");
        s
    };
}

/// Check if a tag name is a tag-style component invocation (`<Foo>`,
/// `<Ui::Button>`, `<@slot>`, `<item.row>`)
pub fn is_component_tag(tag_name: &str) -> bool {
    let first_upper = tag_name
        .chars()
        .next()
        .map(|c| c.is_uppercase())
        .unwrap_or(false);
    first_upper || tag_name.starts_with('@') || tag_name.contains('.')
}

pub fn is_void_tag(tag_name: &str) -> bool {
    VOID_TAGS.contains(tag_name)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a content run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Eof,
    CloseTag,
    Else,
    CloseBlock,
}

/// Path, arguments and trailing markers of one curly tag or sub-expression.
struct CallParts {
    path: Expression,
    params: Vec<Expression>,
    hash: Hash,
    block_params: Vec<String>,
    close_strip: bool,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    identity: &'a str,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, identity: &'a str) -> Self {
        Parser {
            src,
            pos: 0,
            identity,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> CodemodError {
        let loc = SourceLocation::of_offset(self.src, offset);
        CodemodError::Parse {
            file: self.identity.to_string(),
            line: loc.line,
            column: loc.column,
            message: message.into(),
        }
    }

    fn unrecognized(&self, offset: usize, construct: &str) -> CodemodError {
        let loc = SourceLocation::of_offset(self.src, offset);
        CodemodError::UnrecognizedNode {
            file: self.identity.to_string(),
            line: loc.line,
            column: loc.column,
            construct: construct.to_string(),
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn next_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn is_start_tag_at(&self, offset: usize) -> bool {
        let mut chars = self.src[offset..].chars();
        chars.next() == Some('<')
            && chars
                .next()
                .map(|c| c.is_ascii_alphabetic() || c == '@' || c == ':' || c == '_')
                .unwrap_or(false)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONTENT
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_content(&mut self) -> Result<(Vec<Statement>, Stop), CodemodError> {
        let mut body = Vec::new();

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Ok((body, Stop::Eof));
            }

            if rest.starts_with("{{") {
                if ELSE_TAG_RE.is_match(rest) {
                    return Ok((body, Stop::Else));
                }
                if CLOSE_BLOCK_RE.is_match(rest) {
                    return Ok((body, Stop::CloseBlock));
                }
                body.push(self.parse_curly()?);
                continue;
            }

            if rest.starts_with("<!--") {
                body.push(self.parse_html_comment()?);
                continue;
            }

            if rest.starts_with("</") {
                return Ok((body, Stop::CloseTag));
            }

            if self.is_start_tag_at(self.pos) {
                body.push(Statement::Element(self.parse_element()?));
                continue;
            }

            body.push(self.parse_text());
        }
    }

    fn parse_text(&mut self) -> Statement {
        let start = self.pos;
        let mut i = start;

        while i < self.src.len() {
            let rest = &self.src[i..];

            // `\{{...}}` renders literally and stays part of the text run
            if rest.starts_with("\\{{") {
                i = rest[3..]
                    .find("}}")
                    .map(|end| i + 3 + end + 2)
                    .unwrap_or(self.src.len());
                continue;
            }

            if i > start
                && (rest.starts_with("{{")
                    || rest.starts_with("<!--")
                    || rest.starts_with("</")
                    || self.is_start_tag_at(i))
            {
                break;
            }

            i += rest.chars().next().map(char::len_utf8).unwrap_or(1);
        }

        self.pos = i;
        Statement::Text(TextNode {
            chars: self.src[start..i].to_string(),
            loc: Some(Span::new(start, i)),
        })
    }

    fn parse_html_comment(&mut self) -> Result<Statement, CodemodError> {
        let start = self.pos;
        self.pos += 4;
        let end = self
            .rest()
            .find("-->")
            .ok_or_else(|| self.error(start, "Unclosed comment `<!--`"))?;
        let value = self.rest()[..end].to_string();
        self.pos += end + 3;
        Ok(Statement::Comment(CommentStatement {
            value,
            loc: Some(Span::new(start, self.pos)),
        }))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CURLY TAGS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_curly(&mut self) -> Result<Statement, CodemodError> {
        let start = self.pos;
        let rest = self.rest();

        if rest.starts_with("{{{{") {
            return Err(self.unrecognized(start, "{{{{raw}}}}"));
        }
        if rest.starts_with("{{{") {
            return Ok(Statement::Mustache(self.parse_mustache()?));
        }

        self.pos += 2;
        let open_strip = self.eat("~");

        match self.next_char() {
            Some('!') => self.parse_mustache_comment(start),
            Some('#') => {
                self.pos += 1;
                match self.next_char() {
                    Some('>') => Err(self.unrecognized(start, "{{#> partial-block}}")),
                    Some('*') => Err(self.unrecognized(start, "{{#* decorator}}")),
                    _ => Ok(Statement::Block(self.parse_block(start, open_strip)?)),
                }
            }
            Some('>') => Err(self.unrecognized(start, "{{> partial}}")),
            Some('*') => Err(self.unrecognized(start, "{{* decorator}}")),
            Some('^') => Err(self.unrecognized(start, "{{^inverse}}")),
            Some('&') => Err(self.unrecognized(start, "{{& unescaped}}")),
            _ => {
                self.pos = start;
                Ok(Statement::Mustache(self.parse_mustache()?))
            }
        }
    }

    fn parse_mustache_comment(&mut self, start: usize) -> Result<Statement, CodemodError> {
        // positioned on `!`
        self.pos += 1;
        let long_form = self.eat("--");

        let found = if long_form {
            let rest = self.rest();
            let plain = rest.find("--}}").map(|i| (i, 4));
            let stripped = rest.find("--~}}").map(|i| (i, 5));
            match (plain, stripped) {
                (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
                (a, b) => a.or(b),
            }
        } else {
            let rest = self.rest();
            rest.find("}}").map(|i| {
                if i > 0 && rest[..i].ends_with('~') {
                    (i - 1, 3)
                } else {
                    (i, 2)
                }
            })
        };
        let (value_len, close_len) =
            found.ok_or_else(|| self.error(start, "Unclosed comment `{{!`"))?;

        let value = self.rest()[..value_len].to_string();
        self.pos += value_len + close_len;
        Ok(Statement::MustacheComment(MustacheCommentStatement {
            value,
            long_form,
            loc: Some(Span::new(start, self.pos)),
        }))
    }

    /// `{{...}}` or `{{{...}}}` positioned on the first brace.
    fn parse_mustache(&mut self) -> Result<MustacheStatement, CodemodError> {
        let start = self.pos;
        let trusting = self.rest().starts_with("{{{");
        self.pos += if trusting { 3 } else { 2 };
        let open_strip = self.eat("~");

        match self.next_char() {
            Some('#') | Some('!') | Some('/') => {
                return Err(self.error(start, "Expected an inline mustache"));
            }
            _ => {}
        }

        let closer = if trusting { "}}}" } else { "}}" };
        let parts = self.parse_call_parts(closer, start)?;
        if !parts.block_params.is_empty() {
            return Err(self.error(start, "Block params are only allowed on blocks and elements"));
        }

        Ok(MustacheStatement {
            path: parts.path,
            params: parts.params,
            hash: parts.hash,
            trusting,
            strip: StripFlags {
                open: open_strip,
                close: parts.close_strip,
            },
            loc: Some(Span::new(start, self.pos)),
        })
    }

    /// Reads `path params* hash* (as |x|)?` up to and including `closer`.
    fn parse_call_parts(&mut self, closer: &str, start: usize) -> Result<CallParts, CodemodError> {
        self.skip_ws();
        let path = self.parse_expression()?;
        let mut params = Vec::new();
        let mut hash = Hash::default();
        let mut block_params = Vec::new();

        loop {
            self.skip_ws();
            let rest = self.rest();

            if rest.is_empty() {
                return Err(self.error(start, format!("Expected `{}` before end of input", closer)));
            }
            if closer.starts_with('}') && rest.starts_with('~') && rest[1..].starts_with(closer) {
                self.pos += 1 + closer.len();
                return Ok(CallParts {
                    path,
                    params,
                    hash,
                    block_params,
                    close_strip: true,
                });
            }
            if rest.starts_with(closer) {
                self.pos += closer.len();
                return Ok(CallParts {
                    path,
                    params,
                    hash,
                    block_params,
                    close_strip: false,
                });
            }

            if let Some(m) = BLOCK_PARAMS_RE.find(rest) {
                self.pos += m.end();
                block_params = self.parse_block_param_names()?;
                continue;
            }

            if let Some(caps) = HASH_KEY_RE.captures(rest) {
                let pair_start = self.pos;
                let key = caps[1].to_string();
                self.pos += caps[0].len();
                self.skip_ws();
                let value = self.parse_expression()?;
                hash.pairs.push(HashPair {
                    key,
                    value,
                    loc: Some(Span::new(pair_start, self.pos)),
                });
                continue;
            }

            if !hash.is_empty() {
                return Err(self.error(self.pos, "Positional arguments must precede named arguments"));
            }
            params.push(self.parse_expression()?);
        }
    }

    /// Names between `|` after `as |`; the opening pipe is consumed.
    fn parse_block_param_names(&mut self) -> Result<Vec<String>, CodemodError> {
        let start = self.pos;
        let end = self
            .rest()
            .find('|')
            .ok_or_else(|| self.error(start, "Unclosed block params `as |`"))?;
        let names: Vec<String> = self.rest()[..end]
            .split_whitespace()
            .map(str::to_string)
            .collect();
        self.pos += end + 1;
        if names.is_empty() {
            return Err(self.error(start, "Empty block params"));
        }
        Ok(names)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPRESSIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_expression(&mut self) -> Result<Expression, CodemodError> {
        let start = self.pos;
        let rest = self.rest();

        match self.next_char() {
            None => Err(self.error(start, "Expected an expression before end of input")),
            Some('(') => {
                self.pos += 1;
                let parts = self.parse_call_parts(")", start)?;
                if !parts.block_params.is_empty() {
                    return Err(self.error(start, "Block params are not allowed in sub-expressions"));
                }
                Ok(Expression::SubExpression(SubExpression {
                    path: Box::new(parts.path),
                    params: parts.params,
                    hash: parts.hash,
                    loc: Some(Span::new(start, self.pos)),
                }))
            }
            Some(quote @ ('"' | '\'')) => {
                let value = self.parse_string_literal(quote)?;
                Ok(Expression::Literal(LiteralExpression {
                    value: Literal::String(value),
                    loc: Some(Span::new(start, self.pos)),
                }))
            }
            Some(_) => {
                if let Some(m) = NUMBER_RE.find(rest) {
                    let tail = &rest[m.end()..];
                    if !PATH_RE.is_match(tail) {
                        self.pos += m.end();
                        return Ok(Expression::Literal(LiteralExpression {
                            value: Literal::Number(m.as_str().to_string()),
                            loc: Some(Span::new(start, self.pos)),
                        }));
                    }
                }

                let m = PATH_RE.find(rest).ok_or_else(|| {
                    let found = rest.chars().next().unwrap_or(' ');
                    self.error(start, format!("Expected an expression, found `{}`", found))
                })?;
                self.pos += m.end();
                let loc = Some(Span::new(start, self.pos));
                let literal = match m.as_str() {
                    "true" => Some(Literal::Boolean(true)),
                    "false" => Some(Literal::Boolean(false)),
                    "null" => Some(Literal::Null),
                    "undefined" => Some(Literal::Undefined),
                    _ => None,
                };
                Ok(match literal {
                    Some(value) => Expression::Literal(LiteralExpression { value, loc }),
                    None => Expression::Path(PathExpression {
                        original: m.as_str().to_string(),
                        loc,
                    }),
                })
            }
        }
    }

    fn parse_string_literal(&mut self, quote: char) -> Result<String, CodemodError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        let mut chars = self.rest().char_indices();

        while let Some((i, c)) = chars.next() {
            if c == '\\' {
                if let Some((_, escaped)) = chars.next() {
                    if escaped != quote {
                        value.push('\\');
                    }
                    value.push(escaped);
                }
                continue;
            }
            if c == quote {
                self.pos += i + 1;
                return Ok(value);
            }
            value.push(c);
        }

        Err(self.error(start, "Unterminated string literal"))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BLOCKS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Positioned after `{{#` (or `{{~#`).
    fn parse_block(&mut self, start: usize, open_strip: bool) -> Result<BlockStatement, CodemodError> {
        let parts = self.parse_call_parts("}}", start)?;
        if parts.path.as_path().is_none() {
            return Err(self.error(start, "Block invocations must name a path"));
        }
        let open_loc = Span::new(start, self.pos);
        let mut block = self.parse_block_body(start, parts, open_strip, open_loc, false)?;

        let close_start = self.pos;
        self.pos += 2;
        let close_open_strip = self.eat("~");
        self.skip_ws();
        self.pos += 1; // `/`
        self.skip_ws();
        let name_match = PATH_RE
            .find(self.rest())
            .ok_or_else(|| self.error(close_start, "Expected a block name after `{{/`"))?;
        let close_name = name_match.as_str().to_string();
        self.pos += name_match.end();
        self.skip_ws();
        let close_close_strip = self.eat("~");
        if !self.eat("}}") {
            return Err(self.error(close_start, "Expected `}}` to end the close tag"));
        }

        let open_name = block
            .path
            .as_path()
            .map(|p| p.original.as_str())
            .unwrap_or_default();
        if close_name != open_name {
            return Err(self.error(
                close_start,
                format!("{{{{/{}}}}} does not match {{{{#{}}}}}", close_name, open_name),
            ));
        }

        block.close_strip = StripFlags {
            open: close_open_strip,
            close: close_close_strip,
        };
        block.close_loc = Some(Span::new(close_start, self.pos));
        block.loc = Some(Span::new(start, self.pos));
        Ok(block)
    }

    /// Program and inverse of a block. Stops in front of the close tag,
    /// which belongs to the outermost block of an `{{else if}}` chain.
    fn parse_block_body(
        &mut self,
        start: usize,
        parts: CallParts,
        open_strip: bool,
        open_loc: Span,
        chained: bool,
    ) -> Result<BlockStatement, CodemodError> {
        let name = parts
            .path
            .as_path()
            .map(|p| p.original.clone())
            .unwrap_or_default();

        let (body, stop) = self.parse_content()?;
        let program = Block {
            body,
            block_params: parts.block_params,
            chained: false,
        };

        let mut inverse = None;
        let mut inverse_loc = None;
        let mut inverse_strip = StripFlags::default();

        match stop {
            Stop::CloseBlock => {}
            Stop::Else => {
                let else_start = self.pos;
                self.pos += 2;
                let else_open_strip = self.eat("~");
                self.skip_ws();
                self.pos += "else".len();
                self.skip_ws();

                let plain_close = if self.rest().starts_with("~}}") {
                    Some(true)
                } else if self.rest().starts_with("}}") {
                    Some(false)
                } else {
                    None
                };

                match plain_close {
                    Some(close_strip) => {
                        self.pos += if close_strip { 3 } else { 2 };
                        inverse_loc = Some(Span::new(else_start, self.pos));
                        inverse_strip = StripFlags {
                            open: else_open_strip,
                            close: close_strip,
                        };
                        let (inverse_body, inverse_stop) = self.parse_content()?;
                        match inverse_stop {
                            Stop::CloseBlock => {}
                            Stop::Else => {
                                return Err(self.error(
                                    self.pos,
                                    format!("Unexpected {{{{else}}}} after the inverse of {{{{#{}}}}}", name),
                                ));
                            }
                            Stop::Eof => {
                                return Err(self.error(start, format!("Unclosed block {{{{#{}}}}}", name)));
                            }
                            Stop::CloseTag => {
                                return Err(self.error(
                                    self.pos,
                                    format!("Unexpected closing tag inside {{{{#{}}}}}", name),
                                ));
                            }
                        }
                        inverse = Some(Block {
                            body: inverse_body,
                            block_params: Vec::new(),
                            chained: false,
                        });
                    }
                    None => {
                        let inner_parts = self.parse_call_parts("}}", else_start)?;
                        if inner_parts.path.as_path().is_none() {
                            return Err(self.error(else_start, "Chained blocks must name a path"));
                        }
                        let inner_open = Span::new(else_start, self.pos);
                        let inner = self.parse_block_body(
                            else_start,
                            inner_parts,
                            else_open_strip,
                            inner_open,
                            true,
                        )?;
                        inverse = Some(Block {
                            body: vec![Statement::Block(inner)],
                            block_params: Vec::new(),
                            chained: true,
                        });
                    }
                }
            }
            Stop::Eof => {
                return Err(self.error(start, format!("Unclosed block {{{{#{}}}}}", name)));
            }
            Stop::CloseTag => {
                return Err(self.error(
                    self.pos,
                    format!("Unexpected closing tag inside {{{{#{}}}}}", name),
                ));
            }
        }

        Ok(BlockStatement {
            path: parts.path,
            params: parts.params,
            hash: parts.hash,
            program,
            inverse,
            open_strip: StripFlags {
                open: open_strip,
                close: parts.close_strip,
            },
            inverse_strip,
            close_strip: StripFlags::default(),
            loc: if chained {
                Some(Span::new(start, self.pos))
            } else {
                None
            },
            open_loc: Some(open_loc),
            inverse_loc,
            close_loc: None,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ELEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_element(&mut self) -> Result<ElementNode, CodemodError> {
        let start = self.pos;
        self.pos += 1;
        let tag_match = TAG_NAME_RE
            .find(self.rest())
            .ok_or_else(|| self.error(start, "Expected a tag name"))?;
        let tag = tag_match.as_str().to_string();
        self.pos += tag_match.end();

        let mut attributes = Vec::new();
        let mut modifiers = Vec::new();
        let mut block_params = Vec::new();
        let self_closing;

        loop {
            self.skip_ws();
            let rest = self.rest();

            if rest.is_empty() {
                return Err(self.error(start, format!("Unclosed start tag <{}>", tag)));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                self_closing = false;
                break;
            }
            if rest.starts_with("{{!") || rest.starts_with("{{~!") {
                let comment_start = self.pos;
                self.pos += 2;
                self.eat("~");
                self.parse_mustache_comment(comment_start)?;
                continue;
            }
            if rest.starts_with("{{") {
                let modifier_start = self.pos;
                self.pos += 2;
                self.eat("~");
                let parts = self.parse_call_parts("}}", modifier_start)?;
                modifiers.push(ElementModifierStatement {
                    path: parts.path,
                    params: parts.params,
                    hash: parts.hash,
                    loc: Some(Span::new(modifier_start, self.pos)),
                });
                continue;
            }
            if let Some(m) = BLOCK_PARAMS_RE.find(rest) {
                self.pos += m.end();
                block_params = self.parse_block_param_names()?;
                continue;
            }

            attributes.push(self.parse_attribute(&tag)?);
        }

        let start_tag_loc = Span::new(start, self.pos);

        if self_closing || is_void_tag(&tag) {
            return Ok(ElementNode {
                tag,
                attributes,
                modifiers,
                block_params,
                children: Vec::new(),
                self_closing,
                loc: Some(Span::new(start, self.pos)),
                start_tag_loc: Some(start_tag_loc),
                end_tag_loc: None,
            });
        }

        let (children, stop) = self.parse_content()?;
        if stop != Stop::CloseTag {
            return Err(self.error(start, format!("Unclosed element <{}>", tag)));
        }

        let end_start = self.pos;
        self.pos += 2;
        let close_match = TAG_NAME_RE
            .find(self.rest())
            .ok_or_else(|| self.error(end_start, "Expected a tag name after `</`"))?;
        let close_tag = close_match.as_str().to_string();
        self.pos += close_match.end();
        self.skip_ws();
        if !self.eat(">") {
            return Err(self.error(end_start, format!("Expected `>` to end </{}", close_tag)));
        }
        if close_tag != tag {
            return Err(self.error(
                end_start,
                format!("Closing tag </{}> did not match last open tag <{}>", close_tag, tag),
            ));
        }

        Ok(ElementNode {
            tag,
            attributes,
            modifiers,
            block_params,
            children,
            self_closing: false,
            loc: Some(Span::new(start, self.pos)),
            start_tag_loc: Some(start_tag_loc),
            end_tag_loc: Some(Span::new(end_start, self.pos)),
        })
    }

    fn parse_attribute(&mut self, tag: &str) -> Result<AttrNode, CodemodError> {
        let start = self.pos;
        let name_match = ATTR_NAME_RE.find(self.rest()).ok_or_else(|| {
            self.error(start, format!("Invalid character in start tag <{}>", tag))
        })?;
        let name = name_match.as_str().to_string();
        self.pos += name_match.end();

        let after_name = self.pos;
        self.skip_ws();
        if !self.eat("=") {
            self.pos = after_name;
            return Ok(AttrNode {
                name,
                value: AttrValue::Text(TextNode {
                    chars: String::new(),
                    loc: None,
                }),
                loc: Some(Span::new(start, self.pos)),
            });
        }
        self.skip_ws();

        let value_start = self.pos;
        let value = match self.next_char() {
            Some(quote @ ('"' | '\'')) => self.parse_quoted_attr_value(quote)?,
            Some('{') if self.rest().starts_with("{{") => {
                AttrValue::Mustache(self.parse_mustache()?)
            }
            _ => {
                let m = UNQUOTED_VALUE_RE
                    .find(self.rest())
                    .ok_or_else(|| self.error(value_start, format!("Missing value for `{}`", name)))?;
                let mut end = m.end();
                // `<input value=x/>`: the slash closes the tag; a lone `/` is the value
                if end > 1 && self.rest()[..end].ends_with('/') && self.rest()[end..].starts_with('>') {
                    end -= 1;
                }
                let chars = self.rest()[..end].to_string();
                self.pos += end;
                AttrValue::Text(TextNode {
                    chars,
                    loc: Some(Span::new(value_start, self.pos)),
                })
            }
        };

        Ok(AttrNode {
            name,
            value,
            loc: Some(Span::new(start, self.pos)),
        })
    }

    fn parse_quoted_attr_value(&mut self, quote: char) -> Result<AttrValue, CodemodError> {
        let start = self.pos;
        self.pos += 1;
        let mut parts = Vec::new();
        let mut text_start = self.pos;

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(start, "Unterminated attribute value"));
            }
            if rest.starts_with(quote) || rest.starts_with("{{") {
                if self.pos > text_start {
                    parts.push(ConcatPart::Text(TextNode {
                        chars: self.src[text_start..self.pos].to_string(),
                        loc: Some(Span::new(text_start, self.pos)),
                    }));
                }
                if rest.starts_with(quote) {
                    self.pos += 1;
                    break;
                }
                parts.push(ConcatPart::Mustache(self.parse_mustache()?));
                text_start = self.pos;
                continue;
            }
            self.pos += rest.chars().next().map(char::len_utf8).unwrap_or(1);
        }

        let loc = Some(Span::new(start, self.pos));
        let has_mustache = parts.iter().any(|p| matches!(p, ConcatPart::Mustache(_)));
        if has_mustache {
            return Ok(AttrValue::Concat(ConcatStatement { parts, loc }));
        }

        let chars = parts
            .into_iter()
            .filter_map(|p| match p {
                ConcatPart::Text(t) => Some(t.chars),
                ConcatPart::Mustache(_) => None,
            })
            .collect::<String>();
        Ok(AttrValue::Text(TextNode { chars, loc }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN PARSING FUNCTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse template source. `identity` names the template in errors and in the
/// returned [`Template`].
pub fn parse_template(source: &str, identity: &str) -> Result<Template, CodemodError> {
    let mut parser = Parser::new(source, identity);
    let (body, stop) = parser.parse_content()?;

    match stop {
        Stop::Eof => {}
        Stop::CloseTag => {
            return Err(parser.error(parser.pos, "Closing tag without a matching open tag"));
        }
        Stop::Else => {
            return Err(parser.error(parser.pos, "{{else}} outside of a block"));
        }
        Stop::CloseBlock => {
            return Err(parser.error(parser.pos, "Close block without a matching open block"));
        }
    }

    Ok(Template {
        identity: identity.to_string(),
        source: source.to_string(),
        body,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

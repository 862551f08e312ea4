//! Template AST
//!
//! Every node produced by the parser carries the byte span it was read from.
//! Nodes built by a pass have no span; the printer reproduces spanned nodes
//! verbatim from source and prints span-less nodes structurally.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte range into the template source (end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// 1-based line and column of a byte offset.
    pub fn of_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source.as_bytes()[..offset];
        let line = before.iter().filter(|&&b| b == b'\n').count() as u32 + 1;
        let line_start = before
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let column = source
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - line_start) as u32
            + 1;
        SourceLocation { line, column }
    }
}

/// Identity of a source node within one pass. Two clones of the same parsed
/// node share an identity; synthetic nodes have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Stable path/name of the template, the join key with telemetry.
    pub identity: String,
    pub source: String,
    pub body: Vec<Statement>,
}

impl Template {
    pub fn location(&self, span: Span) -> SourceLocation {
        SourceLocation::of_offset(&self.source, span.start)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Statement {
    Text(TextNode),
    Mustache(MustacheStatement),
    Block(BlockStatement),
    Element(ElementNode),
    Comment(CommentStatement),
    MustacheComment(MustacheCommentStatement),
}

impl Statement {
    pub fn loc(&self) -> Option<Span> {
        match self {
            Statement::Text(t) => t.loc,
            Statement::Mustache(m) => m.loc,
            Statement::Block(b) => b.loc,
            Statement::Element(e) => e.loc,
            Statement::Comment(c) => c.loc,
            Statement::MustacheComment(c) => c.loc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub chars: String,
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentStatement {
    pub value: String,
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MustacheCommentStatement {
    pub value: String,
    /// `{{!-- --}}` rather than `{{! }}`
    pub long_form: bool,
    pub loc: Option<Span>,
}

/// `~` whitespace-control markers on one curly tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StripFlags {
    pub open: bool,
    pub close: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// INVOCATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Inline invocation: `{{name p1 k=v}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MustacheStatement {
    pub path: Expression,
    pub params: Vec<Expression>,
    pub hash: Hash,
    /// `{{{ }}}` output
    pub trusting: bool,
    pub strip: StripFlags,
    pub loc: Option<Span>,
}

/// Block invocation: `{{#name ...}}program{{else}}inverse{{/name}}`.
///
/// A chained `{{else if x}}` is represented as an inverse [`Block`] with
/// `chained` set, holding a single `BlockStatement` that has no close tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStatement {
    pub path: Expression,
    pub params: Vec<Expression>,
    pub hash: Hash,
    pub program: Block,
    pub inverse: Option<Block>,
    pub open_strip: StripFlags,
    pub inverse_strip: StripFlags,
    pub close_strip: StripFlags,
    pub loc: Option<Span>,
    /// `{{#...}}`, or `{{else ...}}` for a chained block
    pub open_loc: Option<Span>,
    /// `{{else}}` separating program and a non-chained inverse
    pub inverse_loc: Option<Span>,
    /// `{{/...}}`; absent for chained blocks
    pub close_loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub body: Vec<Statement>,
    pub block_params: Vec<String>,
    pub chained: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Vec<AttrNode>,
    pub modifiers: Vec<ElementModifierStatement>,
    pub block_params: Vec<String>,
    pub children: Vec<Statement>,
    pub self_closing: bool,
    pub loc: Option<Span>,
    pub start_tag_loc: Option<Span>,
    /// Absent for self-closing and void elements
    pub end_tag_loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttrNode {
    pub name: String,
    pub value: AttrValue,
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AttrValue {
    /// Static text; empty for a valueless attribute
    Text(TextNode),
    Mustache(MustacheStatement),
    /// Quoted value mixing text and mustaches
    Concat(ConcatStatement),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcatStatement {
    pub parts: Vec<ConcatPart>,
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConcatPart {
    Text(TextNode),
    Mustache(MustacheStatement),
}

/// `<div {{on "click" this.save}}>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementModifierStatement {
    pub path: Expression,
    pub params: Vec<Expression>,
    pub hash: Hash,
    pub loc: Option<Span>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Expression {
    Path(PathExpression),
    SubExpression(SubExpression),
    Literal(LiteralExpression),
}

impl Expression {
    pub fn as_path(&self) -> Option<&PathExpression> {
        match self {
            Expression::Path(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathExpression {
    pub original: String,
    pub loc: Option<Span>,
}

impl PathExpression {
    /// `this` or `this.x`
    pub fn is_this(&self) -> bool {
        self.original == "this" || self.original.starts_with("this.")
    }

    /// `@name`
    pub fn is_arg(&self) -> bool {
        self.original.starts_with('@')
    }

    /// First segment before any `.`
    pub fn head(&self) -> &str {
        self.original
            .split('.')
            .next()
            .unwrap_or(self.original.as_str())
    }

    pub fn has_tail(&self) -> bool {
        self.original.contains('.')
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubExpression {
    pub path: Box<Expression>,
    pub params: Vec<Expression>,
    pub hash: Hash,
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiteralExpression {
    pub value: Literal,
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Literal {
    String(String),
    /// Kept as written so `1.50` prints as `1.50`
    Number(String),
    Boolean(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Hash {
    pub pairs: Vec<HashPair>,
}

impl Hash {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashPair {
    pub key: String,
    pub value: Expression,
    pub loc: Option<Span>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Constructors for synthetic (span-less) nodes.
pub mod builders {
    use super::*;

    pub fn path(original: &str) -> Expression {
        Expression::Path(PathExpression {
            original: original.to_string(),
            loc: None,
        })
    }

    pub fn string(value: &str) -> Expression {
        Expression::Literal(LiteralExpression {
            value: Literal::String(value.to_string()),
            loc: None,
        })
    }

    pub fn sexpr(path: Expression, params: Vec<Expression>) -> Expression {
        Expression::SubExpression(SubExpression {
            path: Box::new(path),
            params,
            hash: Hash::default(),
            loc: None,
        })
    }

    pub fn text(chars: &str) -> Statement {
        Statement::Text(TextNode {
            chars: chars.to_string(),
            loc: None,
        })
    }

    pub fn mustache(path: Expression, params: Vec<Expression>, hash: Hash) -> MustacheStatement {
        MustacheStatement {
            path,
            params,
            hash,
            trusting: false,
            strip: StripFlags::default(),
            loc: None,
        }
    }

    pub fn program(body: Vec<Statement>, block_params: Vec<String>) -> Block {
        Block {
            body,
            block_params,
            chained: false,
        }
    }

    pub fn block(
        path: Expression,
        params: Vec<Expression>,
        hash: Hash,
        program: Block,
        inverse: Option<Block>,
    ) -> Statement {
        Statement::Block(BlockStatement {
            path,
            params,
            hash,
            program,
            inverse,
            open_strip: StripFlags::default(),
            inverse_strip: StripFlags::default(),
            close_strip: StripFlags::default(),
            loc: None,
            open_loc: None,
            inverse_loc: None,
            close_loc: None,
        })
    }

    pub fn attr(name: &str, value: AttrValue) -> AttrNode {
        AttrNode {
            name: name.to_string(),
            value,
            loc: None,
        }
    }

    pub fn element(
        tag: &str,
        attributes: Vec<AttrNode>,
        children: Vec<Statement>,
        block_params: Vec<String>,
        self_closing: bool,
    ) -> ElementNode {
        ElementNode {
            tag: tag.to_string(),
            attributes,
            modifiers: Vec::new(),
            block_params,
            children,
            self_closing,
            loc: None,
            start_tag_loc: None,
            end_tag_loc: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_of_offset() {
        let source = "<div>\n  {{foo}}\n</div>";
        let offset = source.find("{{foo").unwrap();
        assert_eq!(
            SourceLocation::of_offset(source, offset),
            SourceLocation { line: 2, column: 3 }
        );
        assert_eq!(
            SourceLocation::of_offset(source, 0),
            SourceLocation { line: 1, column: 1 }
        );
    }

    #[test]
    fn test_path_kinds() {
        let this_path = PathExpression {
            original: "this.title".to_string(),
            loc: None,
        };
        assert!(this_path.is_this());
        assert!(this_path.has_tail());

        let arg = PathExpression {
            original: "@model".to_string(),
            loc: None,
        };
        assert!(arg.is_arg());
        assert_eq!(arg.head(), "@model");

        let nested = PathExpression {
            original: "ui/x-button".to_string(),
            loc: None,
        };
        assert!(!nested.has_tail());
        assert!(!nested.is_this());
    }
}

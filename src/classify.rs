//! Invocation classification shared by both passes.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use crate::ast::builders as b;
use crate::ast::{
    AttrNode, AttrValue, BlockStatement, Expression, Hash, MustacheStatement, NodeId, Span,
    Statement, StripFlags,
};
use crate::parse::is_component_tag;
use crate::visitor::BlockScopes;

lazy_static! {
    /// Control-flow and structural invocations that never name a component.
    pub static ref RESERVED_BUILTINS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("if");
        s.insert("unless");
        s.insert("with");
        s.insert("let");
        s.insert("component");
        s.insert("each");
        s.insert("each-in");
        s.insert("link-to");
        s.insert("textarea");
        s.insert("input");
        s.insert("outlet");
        s.insert("yield");
        s.insert("mount");
        s.insert("in-element");
        s.insert("-in-element");
        s.insert("debugger");
        s.insert("log");
        s.insert("has-block");
        s.insert("hasBlock");
        s.insert("has-block-params");
        s.insert("partial");
        s.insert("unbound");
        s
    };

    static ref NAME_SEGMENT_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED_BUILTINS.contains(name)
}

// ═══════════════════════════════════════════════════════════════════════════════
// INVOCATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// A statement in invocation position.
#[derive(Debug, Clone, Copy)]
pub enum Invocation<'a> {
    Inline(&'a MustacheStatement),
    Block(&'a BlockStatement),
}

impl<'a> Invocation<'a> {
    pub fn of(statement: &'a Statement) -> Option<Self> {
        match statement {
            Statement::Mustache(m) => Some(Invocation::Inline(m)),
            Statement::Block(b) => Some(Invocation::Block(b)),
            Statement::Text(_)
            | Statement::Element(_)
            | Statement::Comment(_)
            | Statement::MustacheComment(_) => None,
        }
    }

    pub fn path(&self) -> &'a Expression {
        match self {
            Invocation::Inline(m) => &m.path,
            Invocation::Block(b) => &b.path,
        }
    }

    pub fn params(&self) -> &'a [Expression] {
        match self {
            Invocation::Inline(m) => &m.params,
            Invocation::Block(b) => &b.params,
        }
    }

    pub fn hash(&self) -> &'a Hash {
        match self {
            Invocation::Inline(m) => &m.hash,
            Invocation::Block(b) => &b.hash,
        }
    }

    pub fn loc(&self) -> Option<Span> {
        match self {
            Invocation::Inline(m) => m.loc,
            Invocation::Block(b) => b.loc,
        }
    }

    /// True if any curly tag of the invocation carries a `~` marker.
    pub fn controls_whitespace(&self) -> bool {
        let marked = |f: StripFlags| f.open || f.close;
        match self {
            Invocation::Inline(m) => marked(m.strip),
            Invocation::Block(b) => {
                marked(b.open_strip) || marked(b.inverse_strip) || marked(b.close_strip)
            }
        }
    }

    /// Source nodes only; synthetic nodes have no identity.
    pub fn id(&self) -> Option<NodeId> {
        self.loc().map(|span| NodeId(span.start))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationClass<'a> {
    /// Builtin control construct
    Reserved,
    /// Resolution is already known without a registry (`this.x`, `@x`,
    /// locals, literals, `{{{ }}}` output)
    Unambiguous,
    /// May be a component or a helper; only the registry can tell
    Ambiguous(&'a str),
}

pub fn classify<'a>(invocation: &Invocation<'a>, scopes: &BlockScopes) -> InvocationClass<'a> {
    if let Invocation::Inline(m) = invocation {
        if m.trusting {
            return InvocationClass::Unambiguous;
        }
    }

    let Some(path) = invocation.path().as_path() else {
        return InvocationClass::Unambiguous;
    };

    if is_reserved(&path.original) {
        return InvocationClass::Reserved;
    }
    if path.is_this() || path.is_arg() || path.has_tail() || scopes.is_local(path.head()) {
        return InvocationClass::Unambiguous;
    }

    InvocationClass::Ambiguous(&path.original)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TAG-STYLE TRANSLATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Tag-style identifier for an invocation name: `foo-bar` → `FooBar`,
/// `ui/x-button` → `Ui::XButton`. None if the name has no tag form.
pub fn to_tag_name(name: &str) -> Option<String> {
    let mut segments = Vec::new();

    for segment in name.split('/') {
        if !NAME_SEGMENT_RE.is_match(segment) {
            return None;
        }
        let mut pascal = String::new();
        for word in segment.split(|c: char| c == '-' || c == '_') {
            // an empty word would map `-private` onto `private`
            let mut chars = word.chars();
            let first = chars.next()?;
            pascal.extend(first.to_uppercase());
            pascal.push_str(chars.as_str());
        }
        segments.push(pascal);
    }

    let tag = segments.join("::");
    let starts_with_letter = tag.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if starts_with_letter && is_component_tag(&tag) {
        Some(tag)
    } else {
        None
    }
}

/// `k=v` pairs as `@k={{v}}` arguments, in source order, values unchanged.
pub fn hash_to_arg_attributes(hash: &Hash) -> Vec<AttrNode> {
    hash.pairs
        .iter()
        .map(|pair| {
            b::attr(
                &format!("@{}", pair.key),
                AttrValue::Mustache(b::mustache(pair.value.clone(), Vec::new(), Hash::default())),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_template;

    fn first_class(source: &str) -> String {
        let template = parse_template(source, "t.hbs").unwrap();
        let invocation = Invocation::of(&template.body[0]).expect("invocation");
        format!("{:?}", classify(&invocation, &BlockScopes::new()))
    }

    #[test]
    fn test_reserved_names_are_reserved() {
        for name in ["if", "each", "link-to", "outlet", "yield", "component"] {
            assert!(is_reserved(name), "{}", name);
        }
        assert!(!is_reserved("user-card"));
        assert_eq!(first_class("{{outlet}}"), "Reserved");
        assert_eq!(first_class("{{#each xs as |x|}}{{x}}{{/each}}"), "Reserved");
    }

    #[test]
    fn test_unambiguous_forms() {
        assert_eq!(first_class("{{this.name}}"), "Unambiguous");
        assert_eq!(first_class("{{@title}}"), "Unambiguous");
        assert_eq!(first_class("{{model.name}}"), "Unambiguous");
        assert_eq!(first_class(r#"{{"literal"}}"#), "Unambiguous");
        assert_eq!(first_class("{{{html-safe-thing}}}"), "Unambiguous");
    }

    #[test]
    fn test_ambiguous_forms() {
        assert_eq!(first_class("{{user-card}}"), r#"Ambiguous("user-card")"#);
        assert_eq!(first_class("{{format-date d}}"), r#"Ambiguous("format-date")"#);
        assert_eq!(first_class("{{#ui/panel}}x{{/ui/panel}}"), r#"Ambiguous("ui/panel")"#);
    }

    #[test]
    fn test_locals_are_unambiguous() {
        let template = parse_template("{{row}}", "t.hbs").unwrap();
        let invocation = Invocation::of(&template.body[0]).unwrap();
        let mut scopes = BlockScopes::new();
        scopes.push(&["row".to_string()]);
        assert_eq!(classify(&invocation, &scopes), InvocationClass::Unambiguous);
    }

    #[test]
    fn test_to_tag_name() {
        assert_eq!(to_tag_name("foo").as_deref(), Some("Foo"));
        assert_eq!(to_tag_name("user-card").as_deref(), Some("UserCard"));
        assert_eq!(to_tag_name("x-foo_bar").as_deref(), Some("XFooBar"));
        assert_eq!(to_tag_name("ui/x-button").as_deref(), Some("Ui::XButton"));
        assert_eq!(to_tag_name("fooBar").as_deref(), Some("FooBar"));
        assert_eq!(to_tag_name("-private"), None);
        assert_eq!(to_tag_name("trailing-"), None);
        assert_eq!(to_tag_name("double--dash"), None);
        assert_eq!(to_tag_name("snake__case"), None);
        assert_eq!(to_tag_name("1-up"), None);
        assert_eq!(to_tag_name("ui//x"), None);
        assert_eq!(to_tag_name("foo$"), None);
    }

    #[test]
    fn test_hash_to_arg_attributes_keeps_order_and_values() {
        let template = parse_template("{{card title=this.t count=(add 1 2)}}", "t.hbs").unwrap();
        let Statement::Mustache(m) = &template.body[0] else {
            panic!("expected mustache");
        };
        let attrs = hash_to_arg_attributes(&m.hash);
        let names: Vec<&str> = attrs.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["@title", "@count"]);
        let AttrValue::Mustache(value) = &attrs[1].value else {
            panic!("expected mustache value");
        };
        assert_eq!(value.path, m.hash.pairs[1].value);
        assert!(value.loc.is_none());
    }
}

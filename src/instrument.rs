//! Detection Injector
//!
//! Wraps every ambiguous invocation in a runtime probe:
//!
//! ```text
//! {{#if (-probe-is-component "name" "identity")}}X{{else}}X{{/if}}
//! ```
//!
//! Both branches hold the original invocation, so rendering is unchanged and
//! only the probe's recorded usage is affected.

#[cfg(feature = "napi")]
use napi_derive::napi;
use tracing::debug;

use crate::ast::builders as b;
use crate::ast::{BlockStatement, Expression, Hash, NodeId, Statement, Template};
use crate::classify::{classify, Invocation, InvocationClass};
use crate::visitor::{walk_statement, BlockScopes, PassOutput, SeenSet, TemplateVisitor};

/// Helper name the probe conditional calls.
pub const PROBE_HELPER: &str = "-probe-is-component";

/// `{{#if (-probe-is-component "<name>" "<identity>")}}X{{else}}X{{/if}}`
///
/// Outer `~` markers of X are repeated on the wrapper (`{{~#if ...}}`,
/// `{{/if~}}`) so the text around it is trimmed as before.
pub fn probe_conditional(name: &str, identity: &str, invocation: Statement) -> Statement {
    let (strip_before, strip_after) = match &invocation {
        Statement::Mustache(m) => (m.strip.open, m.strip.close),
        Statement::Block(block) => (block.open_strip.open, block.close_strip.close),
        _ => (false, false),
    };
    let check = b::sexpr(
        b::path(PROBE_HELPER),
        vec![b::string(name), b::string(identity)],
    );
    let mut wrapper = b::block(
        b::path("if"),
        vec![check],
        Hash::default(),
        b::program(vec![invocation.clone()], Vec::new()),
        Some(b::program(vec![invocation], Vec::new())),
    );
    if let Statement::Block(block) = &mut wrapper {
        block.open_strip.open = strip_before;
        block.close_strip.close = strip_after;
    }
    wrapper
}

/// True for a conditional shaped like the output of [`probe_conditional`],
/// whether built by this pass or read back from instrumented source.
pub fn is_probe_wrapper(block: &BlockStatement) -> bool {
    let is_if = block
        .path
        .as_path()
        .map(|p| p.original == "if")
        .unwrap_or(false);
    if !is_if || block.params.len() != 1 || !block.hash.is_empty() {
        return false;
    }

    let calls_probe = match &block.params[0] {
        Expression::SubExpression(sexpr) => sexpr
            .path
            .as_path()
            .map(|p| p.original == PROBE_HELPER)
            .unwrap_or(false),
        _ => false,
    };

    let Some(inverse) = &block.inverse else {
        return false;
    };

    calls_probe
        && !inverse.chained
        && block.program.block_params.is_empty()
        && block.program.body.len() == 1
        && inverse.body.len() == 1
}

struct Instrumenter<'a> {
    identity: &'a str,
    seen: SeenSet,
    scopes: BlockScopes,
    wrapped: usize,
}

impl<'a> Instrumenter<'a> {
    fn target(&self, statement: &Statement) -> Option<(String, NodeId)> {
        let invocation = Invocation::of(statement)?;
        // synthetic nodes are never candidates
        let id = invocation.id()?;
        if self.seen.contains(id) {
            return None;
        }
        match classify(&invocation, &self.scopes) {
            InvocationClass::Ambiguous(name) => Some((name.to_string(), id)),
            InvocationClass::Reserved | InvocationClass::Unambiguous => None,
        }
    }
}

impl<'a> TemplateVisitor for Instrumenter<'a> {
    fn visit_statement(&mut self, statement: &mut Statement) {
        if let Statement::Block(block) = statement {
            if block.loc.is_some() && is_probe_wrapper(block) {
                return;
            }
        }

        // nested content first, so a wrapped block carries instrumented children
        walk_statement(self, statement);

        if let Some((name, id)) = self.target(statement) {
            self.seen.insert(id);
            let invocation = std::mem::replace(statement, b::text(""));
            *statement = probe_conditional(&name, self.identity, invocation);
            self.wrapped += 1;
            debug!(template = self.identity, name = %name, "wrapped invocation");
        }
    }

    fn enter_scope(&mut self, block_params: &[String]) {
        self.scopes.push(block_params);
    }

    fn exit_scope(&mut self) {
        self.scopes.pop();
    }
}

/// Wrap every ambiguous invocation of `template` in a probe conditional.
pub fn instrument_template(mut template: Template) -> PassOutput {
    let identity = template.identity.clone();
    let mut instrumenter = Instrumenter {
        identity: &identity,
        seen: SeenSet::new(),
        scopes: BlockScopes::new(),
        wrapped: 0,
    };
    instrumenter.visit_template(&mut template);
    let changes = instrumenter.wrapped;

    PassOutput { template, changes }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRIP
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Stripper {
    unwrapped: usize,
}

impl TemplateVisitor for Stripper {
    fn visit_body(&mut self, body: &mut Vec<Statement>) {
        let mut index = 0;
        while index < body.len() {
            let consequent = match &mut body[index] {
                Statement::Block(block) if is_probe_wrapper(block) => {
                    Some(std::mem::take(&mut block.program.body))
                }
                _ => None,
            };
            match consequent {
                Some(inner) => {
                    self.unwrapped += 1;
                    // the unwrapped invocation is examined again at the same index
                    body.splice(index..=index, inner);
                }
                None => {
                    self.visit_statement(&mut body[index]);
                    index += 1;
                }
            }
        }
    }
}

/// Replace every probe conditional with the invocation it wraps.
pub fn strip_instrumentation(mut template: Template) -> PassOutput {
    let mut stripper = Stripper::default();
    stripper.visit_template(&mut template);

    PassOutput {
        template,
        changes: stripper.unwrapped,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi(object)]
pub struct NativePassResult {
    pub code: String,
    pub changes: u32,
}

#[cfg(feature = "napi")]
pub(crate) fn native_pass(
    source: String,
    identity: String,
    pass: impl FnOnce(Template) -> PassOutput,
) -> napi::Result<NativePassResult> {
    let template = crate::parse::parse_template(&source, &identity)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let output = pass(template);
    let code = crate::print::print_template(&output.template)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    Ok(NativePassResult {
        code,
        changes: output.changes as u32,
    })
}

#[cfg(feature = "napi")]
#[napi]
pub fn instrument_template_native(source: String, identity: String) -> napi::Result<NativePassResult> {
    native_pass(source, identity, instrument_template)
}

#[cfg(feature = "napi")]
#[napi]
pub fn strip_instrumentation_native(source: String, identity: String) -> napi::Result<NativePassResult> {
    native_pass(source, identity, strip_instrumentation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_template;
    use crate::print::print_template;

    fn instrument(source: &str) -> (String, usize) {
        let output = instrument_template(parse_template(source, "app/t.hbs").unwrap());
        (print_template(&output.template).unwrap(), output.changes)
    }

    #[test]
    fn test_probe_conditional_shape() {
        let (code, changes) = instrument("{{foo}}");
        assert_eq!(
            code,
            r#"{{#if (-probe-is-component "foo" "app/t.hbs")}}{{foo}}{{else}}{{foo}}{{/if}}"#
        );
        assert_eq!(changes, 1);
    }

    #[test]
    fn test_is_probe_wrapper_recognises_parsed_wrapper() {
        let (code, _) = instrument("{{foo}}");
        let template = parse_template(&code, "app/t.hbs").unwrap();
        let Statement::Block(block) = &template.body[0] else {
            panic!("expected block");
        };
        assert!(is_probe_wrapper(block));

        let plain = parse_template("{{#if x}}a{{else}}b{{/if}}", "t.hbs").unwrap();
        let Statement::Block(block) = &plain.body[0] else {
            panic!("expected block");
        };
        assert!(!is_probe_wrapper(block));
    }

    #[test]
    fn test_seen_node_is_not_wrapped_twice() {
        let mut template = parse_template("{{foo}}", "t.hbs").unwrap();
        let duplicate = template.body[0].clone();
        template.body.push(duplicate);
        let output = instrument_template(template);
        assert_eq!(output.changes, 1);
        assert!(matches!(output.template.body[1], Statement::Mustache(_)));
    }

    #[test]
    fn test_synthetic_invocations_are_not_wrapped() {
        let mut template = parse_template("", "t.hbs").unwrap();
        template
            .body
            .push(Statement::Mustache(b::mustache(b::path("foo"), vec![], Hash::default())));
        assert_eq!(instrument_template(template).changes, 0);
    }

    #[test]
    fn test_chained_else_is_left_alone() {
        let source = "{{#if a}}A{{else foo}}B{{/if}}";
        let (code, changes) = instrument(source);
        assert_eq!(code, source);
        assert_eq!(changes, 0);
    }

    #[test]
    fn test_strip_counts_wrappers() {
        let (code, _) = instrument("{{a}} {{b}}");
        let output = strip_instrumentation(parse_template(&code, "app/t.hbs").unwrap());
        assert_eq!(output.changes, 2);
        assert_eq!(print_template(&output.template).unwrap(), "{{a}} {{b}}");
    }
}

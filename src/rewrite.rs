//! Rewrite Transformer
//!
//! Replaces invocations confirmed to be components with tag-style
//! invocations:
//!
//! - `{{user-card title=t}}` → `<UserCard @title={{t}} />`
//! - `{{#panel-box as |p|}}body{{/panel-box}}` → `<PanelBox as |p|>\nbody</PanelBox>`
//!
//! The pass is a pure function of the template and the confirmed names for
//! its identity. It never queries a registry.

#[cfg(feature = "napi")]
use napi_derive::napi;
use std::collections::BTreeSet;
use tracing::debug;

use crate::ast::builders as b;
use crate::ast::{NodeId, Statement, Template};
use crate::classify::{classify, hash_to_arg_attributes, to_tag_name, Invocation, InvocationClass};
use crate::instrument::strip_instrumentation;
use crate::visitor::{walk_statement, BlockScopes, PassOutput, SeenSet, TemplateVisitor};

struct Rewriter<'a> {
    identity: &'a str,
    confirmed: &'a BTreeSet<String>,
    seen: SeenSet,
    scopes: BlockScopes,
    rewritten: usize,
}

impl<'a> Rewriter<'a> {
    fn target(&self, statement: &Statement) -> Option<(String, NodeId)> {
        let invocation = Invocation::of(statement)?;
        let id = invocation.id()?;
        if self.seen.contains(id) || !invocation.params().is_empty() {
            return None;
        }
        // tag syntax has no `~`; the trimmed whitespace would reappear
        if invocation.controls_whitespace() {
            return None;
        }
        if let Invocation::Block(block) = invocation {
            // a tag has no inverse region
            if block.inverse.is_some() {
                return None;
            }
        }

        let InvocationClass::Ambiguous(name) = classify(&invocation, &self.scopes) else {
            return None;
        };
        if !self.confirmed.contains(name) {
            return None;
        }

        match to_tag_name(name) {
            Some(tag) => Some((tag, id)),
            None => {
                debug!(template = self.identity, name, "confirmed name has no tag form");
                None
            }
        }
    }
}

impl<'a> TemplateVisitor for Rewriter<'a> {
    fn visit_statement(&mut self, statement: &mut Statement) {
        walk_statement(self, statement);

        let Some((tag, id)) = self.target(statement) else {
            return;
        };
        self.seen.insert(id);

        let element = match std::mem::replace(statement, b::text("")) {
            Statement::Mustache(mustache) => {
                b::element(&tag, hash_to_arg_attributes(&mustache.hash), Vec::new(), Vec::new(), true)
            }
            Statement::Block(block) => {
                let mut children = vec![b::text("\n")];
                children.extend(block.program.body);
                b::element(
                    &tag,
                    hash_to_arg_attributes(&block.hash),
                    children,
                    block.program.block_params,
                    false,
                )
            }
            other => {
                *statement = other;
                return;
            }
        };

        *statement = Statement::Element(element);
        self.rewritten += 1;
        debug!(template = self.identity, tag = %tag, "rewrote invocation");
    }

    fn enter_scope(&mut self, block_params: &[String]) {
        self.scopes.push(block_params);
    }

    fn exit_scope(&mut self) {
        self.scopes.pop();
    }
}

/// Rewrite every zero-positional invocation of a confirmed name into tag
/// form. Probe conditionals are removed first, so instrumented and original
/// source rewrite identically.
pub fn rewrite_template(template: Template, confirmed: &BTreeSet<String>) -> PassOutput {
    let mut template = strip_instrumentation(template).template;
    let identity = template.identity.clone();

    let mut rewriter = Rewriter {
        identity: &identity,
        confirmed,
        seen: SeenSet::new(),
        scopes: BlockScopes::new(),
        rewritten: 0,
    };
    rewriter.visit_template(&mut template);
    let changes = rewriter.rewritten;

    PassOutput { template, changes }
}

#[cfg(feature = "napi")]
#[napi]
pub fn apply_telemetry_native(
    source: String,
    identity: String,
    names: Vec<String>,
) -> napi::Result<crate::instrument::NativePassResult> {
    let confirmed: BTreeSet<String> = names.into_iter().collect();
    crate::instrument::native_pass(source, identity, |template| {
        rewrite_template(template, &confirmed)
    })
}

use std::collections::HashSet;

use crate::ast::{Block, BlockStatement, ElementNode, NodeId, Statement, Template};

/// The TemplateVisitor trait defines the single authoritative traversal mechanism for template ASTs.
///
/// Rules:
/// 1. Traversal order is document order and fixed.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers MUST call `walk_*` functions to continue traversal unless pruning is intended.
/// 4. Attribute values and modifiers are not statements and are never visited.
/// 5. `enter_scope`/`exit_scope` bracket every body that binds block params.
/// 6. Chained `{{else if}}` blocks reach `visit_block` but never `visit_statement`.
pub trait TemplateVisitor {
    fn visit_template(&mut self, template: &mut Template) {
        walk_template(self, template);
    }

    fn visit_body(&mut self, body: &mut Vec<Statement>) {
        walk_body(self, body);
    }

    fn visit_statement(&mut self, statement: &mut Statement) {
        walk_statement(self, statement);
    }

    fn visit_block(&mut self, block: &mut BlockStatement) {
        walk_block(self, block);
    }

    fn visit_program(&mut self, program: &mut Block) {
        walk_program(self, program);
    }

    fn visit_element(&mut self, element: &mut ElementNode) {
        walk_element(self, element);
    }

    fn enter_scope(&mut self, _block_params: &[String]) {}

    fn exit_scope(&mut self) {}
}

pub fn walk_template<V: TemplateVisitor + ?Sized>(visitor: &mut V, template: &mut Template) {
    visitor.visit_body(&mut template.body);
}

pub fn walk_body<V: TemplateVisitor + ?Sized>(visitor: &mut V, body: &mut Vec<Statement>) {
    for statement in body.iter_mut() {
        visitor.visit_statement(statement);
    }
}

pub fn walk_statement<V: TemplateVisitor + ?Sized>(visitor: &mut V, statement: &mut Statement) {
    match statement {
        Statement::Block(block) => visitor.visit_block(block),
        Statement::Element(element) => visitor.visit_element(element),
        Statement::Text(_)
        | Statement::Mustache(_)
        | Statement::Comment(_)
        | Statement::MustacheComment(_) => {} // leaves
    }
}

pub fn walk_block<V: TemplateVisitor + ?Sized>(visitor: &mut V, block: &mut BlockStatement) {
    visitor.visit_program(&mut block.program);
    if let Some(inverse) = block.inverse.as_mut() {
        if inverse.chained {
            // `{{else if x}}` continues the enclosing block, it is not an invocation
            for statement in inverse.body.iter_mut() {
                match statement {
                    Statement::Block(chained) => visitor.visit_block(chained),
                    other => visitor.visit_statement(other),
                }
            }
        } else {
            visitor.visit_program(inverse);
        }
    }
}

pub fn walk_program<V: TemplateVisitor + ?Sized>(visitor: &mut V, program: &mut Block) {
    let scoped = !program.block_params.is_empty();
    if scoped {
        visitor.enter_scope(&program.block_params);
    }
    visitor.visit_body(&mut program.body);
    if scoped {
        visitor.exit_scope();
    }
}

pub fn walk_element<V: TemplateVisitor + ?Sized>(visitor: &mut V, element: &mut ElementNode) {
    let scoped = !element.block_params.is_empty();
    if scoped {
        visitor.enter_scope(&element.block_params);
    }
    visitor.visit_body(&mut element.children);
    if scoped {
        visitor.exit_scope();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRAVERSAL STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Nodes already transformed during one pass.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    ids: HashSet<NodeId>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the node was already present.
    pub fn insert(&mut self, id: NodeId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }
}

/// Block params bound by the enclosing blocks and elements, innermost last.
#[derive(Debug, Clone, Default)]
pub struct BlockScopes {
    frames: Vec<Vec<String>>,
}

impl BlockScopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block_params: &[String]) {
        self.frames.push(block_params.to_vec());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.frames
            .iter()
            .rev()
            .any(|frame| frame.iter().any(|param| param == name))
    }
}

/// Result of running one pass over a template.
#[derive(Debug, Clone)]
pub struct PassOutput {
    pub template: Template,
    /// Invocations wrapped, rewritten or unwrapped by the pass
    pub changes: usize,
}

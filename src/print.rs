//! Print Module
//!
//! Turns a [`Template`] back into source text. Nodes carrying a span are
//! copied from the original source byte for byte; nodes built by a pass are
//! printed structurally. Parse followed by print is the identity.

use crate::ast::{
    AttrNode, AttrValue, BlockStatement, ConcatPart, ElementModifierStatement, ElementNode,
    Expression, Hash, Literal, MustacheStatement, Span, Statement, StripFlags, Template,
};
use crate::error::CodemodError;
use crate::parse::is_void_tag;

struct Printer<'a> {
    source: &'a str,
    identity: &'a str,
    out: String,
}

impl<'a> Printer<'a> {
    fn slice(&mut self, span: Span) -> Result<(), CodemodError> {
        let text = self.source.get(span.start..span.end).ok_or_else(|| CodemodError::Print {
            file: self.identity.to_string(),
            message: format!(
                "span {}..{} is outside the {}-byte source",
                span.start,
                span.end,
                self.source.len()
            ),
        })?;
        self.out.push_str(text);
        Ok(())
    }

    fn print_body(&mut self, body: &[Statement]) -> Result<(), CodemodError> {
        for statement in body {
            self.print_statement(statement)?;
        }
        Ok(())
    }

    fn print_statement(&mut self, statement: &Statement) -> Result<(), CodemodError> {
        match statement {
            Statement::Text(text) => {
                self.out.push_str(&text.chars);
                Ok(())
            }
            Statement::Comment(comment) => match comment.loc {
                Some(span) => self.slice(span),
                None => {
                    self.out.push_str(&format!("<!--{}-->", comment.value));
                    Ok(())
                }
            },
            Statement::MustacheComment(comment) => match comment.loc {
                Some(span) => self.slice(span),
                None => {
                    if comment.long_form {
                        self.out.push_str(&format!("{{{{!--{}--}}}}", comment.value));
                    } else {
                        self.out.push_str(&format!("{{{{!{}}}}}", comment.value));
                    }
                    Ok(())
                }
            },
            Statement::Mustache(mustache) => self.print_mustache(mustache),
            Statement::Block(block) => self.print_block(block, false),
            Statement::Element(element) => self.print_element(element),
        }
    }

    fn print_mustache(&mut self, mustache: &MustacheStatement) -> Result<(), CodemodError> {
        if let Some(span) = mustache.loc {
            return self.slice(span);
        }
        let (open, close) = if mustache.trusting {
            ("{{{", "}}}")
        } else {
            ("{{", "}}")
        };
        self.out.push_str(open);
        self.open_strip(mustache.strip);
        self.print_call(&mustache.path, &mustache.params, &mustache.hash)?;
        self.close_strip(mustache.strip);
        self.out.push_str(close);
        Ok(())
    }

    fn print_block(&mut self, block: &BlockStatement, chained: bool) -> Result<(), CodemodError> {
        match block.open_loc {
            Some(span) => self.slice(span)?,
            None => {
                self.out.push_str("{{");
                self.open_strip(block.open_strip);
                self.out.push_str(if chained { "else " } else { "#" });
                self.print_call(&block.path, &block.params, &block.hash)?;
                self.print_block_params(&block.program.block_params);
                self.close_strip(block.open_strip);
                self.out.push_str("}}");
            }
        }

        self.print_body(&block.program.body)?;

        if let Some(inverse) = &block.inverse {
            if inverse.chained {
                for statement in &inverse.body {
                    match statement {
                        Statement::Block(inner) => self.print_block(inner, true)?,
                        other => self.print_statement(other)?,
                    }
                }
            } else {
                match block.inverse_loc {
                    Some(span) => self.slice(span)?,
                    None => {
                        self.out.push_str("{{");
                        self.open_strip(block.inverse_strip);
                        self.out.push_str("else");
                        self.close_strip(block.inverse_strip);
                        self.out.push_str("}}");
                    }
                }
                self.print_body(&inverse.body)?;
            }
        }

        if chained {
            return Ok(());
        }

        match block.close_loc {
            Some(span) => self.slice(span),
            None => {
                self.out.push_str("{{");
                self.open_strip(block.close_strip);
                self.out.push('/');
                self.print_expression(&block.path)?;
                self.close_strip(block.close_strip);
                self.out.push_str("}}");
                Ok(())
            }
        }
    }

    fn print_element(&mut self, element: &ElementNode) -> Result<(), CodemodError> {
        match element.start_tag_loc {
            Some(span) => self.slice(span)?,
            None => {
                self.out.push('<');
                self.out.push_str(&element.tag);
                for attr in &element.attributes {
                    self.out.push(' ');
                    self.print_attribute(attr)?;
                }
                for modifier in &element.modifiers {
                    self.out.push(' ');
                    self.print_modifier(modifier)?;
                }
                self.print_block_params(&element.block_params);
                self.out.push_str(if element.self_closing { " />" } else { ">" });
            }
        }

        if element.self_closing {
            return Ok(());
        }

        self.print_body(&element.children)?;

        match element.end_tag_loc {
            Some(span) => self.slice(span),
            None => {
                // a parsed void element has neither children nor an end tag
                if element.start_tag_loc.is_none() || !is_void_tag(&element.tag) {
                    self.out.push_str(&format!("</{}>", element.tag));
                }
                Ok(())
            }
        }
    }

    fn print_attribute(&mut self, attr: &AttrNode) -> Result<(), CodemodError> {
        if let Some(span) = attr.loc {
            return self.slice(span);
        }
        self.out.push_str(&attr.name);
        match &attr.value {
            AttrValue::Text(text) => {
                if !text.chars.is_empty() {
                    self.out.push_str(&format!("=\"{}\"", text.chars));
                }
                Ok(())
            }
            AttrValue::Mustache(mustache) => {
                self.out.push('=');
                self.print_mustache(mustache)
            }
            AttrValue::Concat(concat) => {
                self.out.push_str("=\"");
                for part in &concat.parts {
                    match part {
                        ConcatPart::Text(text) => self.out.push_str(&text.chars),
                        ConcatPart::Mustache(mustache) => self.print_mustache(mustache)?,
                    }
                }
                self.out.push('"');
                Ok(())
            }
        }
    }

    fn print_modifier(&mut self, modifier: &ElementModifierStatement) -> Result<(), CodemodError> {
        if let Some(span) = modifier.loc {
            return self.slice(span);
        }
        self.out.push_str("{{");
        self.print_call(&modifier.path, &modifier.params, &modifier.hash)?;
        self.out.push_str("}}");
        Ok(())
    }

    fn print_block_params(&mut self, block_params: &[String]) {
        if !block_params.is_empty() {
            self.out.push_str(&format!(" as |{}|", block_params.join(" ")));
        }
    }

    fn print_call(
        &mut self,
        path: &Expression,
        params: &[Expression],
        hash: &Hash,
    ) -> Result<(), CodemodError> {
        self.print_expression(path)?;
        for param in params {
            self.out.push(' ');
            self.print_expression(param)?;
        }
        for pair in &hash.pairs {
            self.out.push(' ');
            match pair.loc {
                Some(span) => self.slice(span)?,
                None => {
                    self.out.push_str(&pair.key);
                    self.out.push('=');
                    self.print_expression(&pair.value)?;
                }
            }
        }
        Ok(())
    }

    fn print_expression(&mut self, expression: &Expression) -> Result<(), CodemodError> {
        match expression {
            Expression::Path(path) => match path.loc {
                Some(span) => self.slice(span),
                None => {
                    self.out.push_str(&path.original);
                    Ok(())
                }
            },
            Expression::SubExpression(sexpr) => match sexpr.loc {
                Some(span) => self.slice(span),
                None => {
                    self.out.push('(');
                    self.print_call(&sexpr.path, &sexpr.params, &sexpr.hash)?;
                    self.out.push(')');
                    Ok(())
                }
            },
            Expression::Literal(literal) => match literal.loc {
                Some(span) => self.slice(span),
                None => {
                    self.out.push_str(&literal_source(&literal.value));
                    Ok(())
                }
            },
        }
    }

    fn open_strip(&mut self, strip: StripFlags) {
        if strip.open {
            self.out.push('~');
        }
    }

    fn close_strip(&mut self, strip: StripFlags) {
        if strip.close {
            self.out.push('~');
        }
    }
}

/// Source form of a literal built by a pass.
fn literal_source(literal: &Literal) -> String {
    match literal {
        Literal::String(value) => {
            if value.contains('"') && !value.contains('\'') {
                format!("'{}'", value)
            } else {
                format!("\"{}\"", value.replace('"', "\\\""))
            }
        }
        Literal::Number(raw) => raw.clone(),
        Literal::Boolean(value) => value.to_string(),
        Literal::Null => "null".to_string(),
        Literal::Undefined => "undefined".to_string(),
    }
}

/// Print a template back to source.
pub fn print_template(template: &Template) -> Result<String, CodemodError> {
    let mut printer = Printer {
        source: &template.source,
        identity: &template.identity,
        out: String::with_capacity(template.source.len()),
    };
    printer.print_body(&template.body)?;
    Ok(printer.out)
}

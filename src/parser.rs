//! Parser for JavaScript source code
//!
//! Recursive descent for statements, precedence climbing for binary
//! expressions. Source is always treated as strict-mode ES5. Nodes are
//! appended to a flat arena; the parser also records, per function body, the
//! `var` names and function declarations that must be hoisted, so that the
//! interpreter never has to walk a body before running it.

use crate::ast::*;
use crate::error::JsError;
use crate::lexer::{Lexer, Span, Token, TokenKind};
use crate::number::number_to_string;
use crate::value::JsString;

/// Parse a complete script
pub fn parse(source: &str) -> Result<Program, JsError> {
    Parser::new(source)?.parse_program()
}

#[derive(Debug, Clone)]
struct Label {
    name: JsString,
    is_loop: bool,
}

/// Jump targets visible from the current position. Reset at function
/// boundaries since `break` and `continue` never cross them.
#[derive(Debug, Default)]
struct JumpContext {
    labels: Vec<Label>,
    loop_depth: u32,
    switch_depth: u32,
}

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    nodes: Vec<Node>,
    function_depth: u32,
    jumps: JumpContext,
    hoisting: Vec<Hoisted>,
    eof: Token,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, JsError> {
        let tokens = Lexer::new(source).tokenize()?;
        let eof = tokens.last().cloned().unwrap_or(Token {
            kind: TokenKind::Eof,
            span: Span::default(),
            newline_before: false,
        });
        Ok(Self {
            source,
            tokens,
            pos: 0,
            nodes: Vec::new(),
            function_depth: 0,
            jumps: JumpContext::default(),
            hoisting: Vec::new(),
            eof,
        })
    }

    /// Parse a complete program
    pub fn parse_program(mut self) -> Result<Program, JsError> {
        let start = self.current().span;
        self.hoisting.push(Hoisted::default());

        let mut body = Vec::new();
        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        let hoisted = self.hoisting.pop().unwrap_or_default();
        let span = self.span_from(start);
        let root = self.push(NodeKind::Program { body, hoisted }, span);
        Ok(Program {
            source: self.source.to_string(),
            nodes: self.nodes,
            root,
        })
    }

    fn push(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, span });
        id
    }

    fn kind_of(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0 as usize).map(|n| &n.kind)
    }

    // ============ STATEMENTS ============

    fn parse_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        match &self.current().kind {
            TokenKind::LBrace => self.parse_block_statement(),
            TokenKind::Semicolon => {
                self.advance();
                Ok(self.push(NodeKind::EmptyStatement, start))
            }
            TokenKind::Var => {
                let decl = self.parse_variable_declaration(false)?;
                self.consume_semicolon()?;
                Ok(decl)
            }
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break => self.parse_break_statement(),
            TokenKind::Continue => self.parse_continue_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Debugger => {
                self.advance();
                self.consume_semicolon()?;
                Ok(self.push(NodeKind::DebuggerStatement, start))
            }
            TokenKind::Reserved(word) if word == "with" => {
                Err(self.error("Strict mode code may not include a with statement"))
            }
            TokenKind::Identifier(_) if self.peek_kind(1) == Some(&TokenKind::Colon) => {
                self.parse_labeled_statement()
            }
            _ => {
                let expression = self.parse_expression(false)?;
                self.consume_semicolon()?;
                let span = self.span_from(start);
                Ok(self.push(NodeKind::ExpressionStatement { expression }, span))
            }
        }
    }

    fn parse_block_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(self.push(NodeKind::BlockStatement { body }, span))
    }

    fn parse_variable_declaration(&mut self, no_in: bool) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::Var)?;

        let mut declarations = Vec::new();
        loop {
            let decl_start = self.current().span;
            let name = self.parse_binding_identifier()?;
            self.hoist_var(&name);
            let init = if self.match_token(&TokenKind::Eq) {
                Some(self.parse_assignment_expression(no_in)?)
            } else {
                None
            };
            let span = self.span_from(decl_start);
            declarations.push(self.push(NodeKind::VariableDeclarator { name, init }, span));
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        let span = self.span_from(start);
        Ok(self.push(NodeKind::VariableDeclaration { declarations }, span))
    }

    fn parse_function_declaration(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::Function)?;
        let name = self.parse_binding_identifier()?;
        let function = self.parse_function_rest(Some(name))?;
        let span = self.span_from(start);
        let id = self.push(NodeKind::FunctionDeclaration(function), span);
        if let Some(frame) = self.hoisting.last_mut() {
            frame.functions.push(id);
        }
        Ok(id)
    }

    /// Parameters and body, after the optional name
    fn parse_function_rest(&mut self, name: Option<JsString>) -> Result<Function, JsError> {
        self.require_token(&TokenKind::LParen)?;
        let mut params: Vec<JsString> = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let param_span = self.current().span;
                let param = self.parse_binding_identifier()?;
                if params.contains(&param) {
                    return Err(JsError::syntax_error(
                        "Duplicate parameter name not allowed in this context",
                        param_span.line,
                        param_span.column,
                    ));
                }
                params.push(param);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.require_token(&TokenKind::RParen)?;

        let saved_jumps = std::mem::take(&mut self.jumps);
        self.function_depth += 1;
        self.hoisting.push(Hoisted::default());

        let body = self.parse_block_statement();

        let hoisted = self.hoisting.pop().unwrap_or_default();
        self.function_depth -= 1;
        self.jumps = saved_jumps;

        Ok(Function {
            name,
            params,
            body: body?,
            hoisted,
        })
    }

    fn parse_if_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::If)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression(false)?;
        self.require_token(&TokenKind::RParen)?;
        let consequent = self.parse_statement()?;
        let alternate = if self.match_token(&TokenKind::Else) {
            Some(self.parse_statement()?)
        } else {
            None
        };
        let span = self.span_from(start);
        Ok(self.push(
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            },
            span,
        ))
    }

    fn parse_loop_body(&mut self) -> Result<NodeId, JsError> {
        self.jumps.loop_depth += 1;
        let body = self.parse_statement();
        self.jumps.loop_depth -= 1;
        body
    }

    fn parse_for_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::For)?;
        self.require_token(&TokenKind::LParen)?;

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if self.check(&TokenKind::Var) {
            Some(self.parse_variable_declaration(true)?)
        } else {
            Some(self.parse_expression(true)?)
        };

        if let Some(left) = init {
            if self.match_token(&TokenKind::In) {
                self.check_for_in_left(left)?;
                let right = self.parse_expression(false)?;
                self.require_token(&TokenKind::RParen)?;
                let body = self.parse_loop_body()?;
                let span = self.span_from(start);
                return Ok(self.push(NodeKind::ForInStatement { left, right, body }, span));
            }
        }

        self.require_token(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.require_token(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.require_token(&TokenKind::RParen)?;
        let body = self.parse_loop_body()?;

        let span = self.span_from(start);
        Ok(self.push(
            NodeKind::ForStatement {
                init,
                test,
                update,
                body,
            },
            span,
        ))
    }

    fn check_for_in_left(&self, left: NodeId) -> Result<(), JsError> {
        let valid = match self.kind_of(left) {
            Some(NodeKind::VariableDeclaration { declarations }) => declarations.len() == 1,
            Some(kind) => kind.is_reference(),
            None => false,
        };
        if valid {
            Ok(())
        } else {
            Err(self.error("Invalid left-hand side in for-in loop"))
        }
    }

    fn parse_while_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression(false)?;
        self.require_token(&TokenKind::RParen)?;
        let body = self.parse_loop_body()?;
        let span = self.span_from(start);
        Ok(self.push(NodeKind::WhileStatement { test, body }, span))
    }

    fn parse_do_while_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::Do)?;
        let body = self.parse_loop_body()?;
        self.require_token(&TokenKind::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression(false)?;
        self.require_token(&TokenKind::RParen)?;
        // A semicolon is always optional after do-while
        self.match_token(&TokenKind::Semicolon);
        let span = self.span_from(start);
        Ok(self.push(NodeKind::DoWhileStatement { body, test }, span))
    }

    fn parse_switch_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::Switch)?;
        self.require_token(&TokenKind::LParen)?;
        let discriminant = self.parse_expression(false)?;
        self.require_token(&TokenKind::RParen)?;
        self.require_token(&TokenKind::LBrace)?;

        self.jumps.switch_depth += 1;
        let cases = self.parse_switch_cases();
        self.jumps.switch_depth -= 1;
        let cases = cases?;

        let span = self.span_from(start);
        Ok(self.push(
            NodeKind::SwitchStatement {
                discriminant,
                cases,
            },
            span,
        ))
    }

    fn parse_switch_cases(&mut self) -> Result<Vec<SwitchCase>, JsError> {
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.match_token(&TokenKind::RBrace) {
            let test = if self.match_token(&TokenKind::Case) {
                Some(self.parse_expression(false)?)
            } else if self.check(&TokenKind::Default) {
                if seen_default {
                    return Err(self.error("More than one default clause in switch statement"));
                }
                seen_default = true;
                self.advance();
                None
            } else {
                return Err(self.unexpected_token("case, default or }"));
            };
            self.require_token(&TokenKind::Colon)?;
            let mut consequent = Vec::new();
            while !matches!(
                self.current().kind,
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, consequent });
        }
        Ok(cases)
    }

    fn parse_try_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::Try)?;
        let block = self.parse_block_statement()?;

        let handler = if self.match_token(&TokenKind::Catch) {
            self.require_token(&TokenKind::LParen)?;
            let param = self.parse_binding_identifier()?;
            self.require_token(&TokenKind::RParen)?;
            let body = self.parse_block_statement()?;
            Some(CatchClause { param, body })
        } else {
            None
        };

        let finalizer = if self.match_token(&TokenKind::Finally) {
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try"));
        }

        let span = self.span_from(start);
        Ok(self.push(
            NodeKind::TryStatement {
                block,
                handler,
                finalizer,
            },
            span,
        ))
    }

    fn parse_return_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        if self.function_depth == 0 {
            return Err(self.error("Illegal return statement"));
        }
        self.require_token(&TokenKind::Return)?;
        let argument = if self.at_statement_end() {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.consume_semicolon()?;
        let span = self.span_from(start);
        Ok(self.push(NodeKind::ReturnStatement { argument }, span))
    }

    /// Optional label after `break`/`continue`, honouring the no-newline rule
    fn parse_jump_label(&mut self) -> Option<JsString> {
        if self.current().newline_before {
            return None;
        }
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    fn parse_break_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::Break)?;
        let label = self.parse_jump_label();
        match &label {
            Some(name) => {
                if !self.jumps.labels.iter().any(|l| &l.name == name) {
                    return Err(self.error(&format!("Undefined label '{}'", name)));
                }
            }
            None => {
                if self.jumps.loop_depth == 0 && self.jumps.switch_depth == 0 {
                    return Err(self.error("Illegal break statement"));
                }
            }
        }
        self.consume_semicolon()?;
        let span = self.span_from(start);
        Ok(self.push(NodeKind::BreakStatement { label }, span))
    }

    fn parse_continue_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::Continue)?;
        let label = self.parse_jump_label();
        match &label {
            Some(name) => {
                if !self
                    .jumps
                    .labels
                    .iter()
                    .any(|l| &l.name == name && l.is_loop)
                {
                    return Err(self.error(&format!("Illegal continue statement: '{}' does not denote an iteration statement", name)));
                }
            }
            None => {
                if self.jumps.loop_depth == 0 {
                    return Err(self.error("Illegal continue statement"));
                }
            }
        }
        self.consume_semicolon()?;
        let span = self.span_from(start);
        Ok(self.push(NodeKind::ContinueStatement { label }, span))
    }

    fn parse_throw_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::Throw)?;
        if self.current().newline_before {
            return Err(self.error("Illegal newline after throw"));
        }
        let argument = self.parse_expression(false)?;
        self.consume_semicolon()?;
        let span = self.span_from(start);
        Ok(self.push(NodeKind::ThrowStatement { argument }, span))
    }

    fn parse_labeled_statement(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        let label = self.parse_binding_identifier()?;
        self.require_token(&TokenKind::Colon)?;

        if self.jumps.labels.iter().any(|l| l.name == label) {
            return Err(JsError::syntax_error(
                format!("Label '{}' has already been declared", label),
                start.line,
                start.column,
            ));
        }

        let is_loop = self.labelled_body_is_loop();
        self.jumps.labels.push(Label {
            name: label.clone(),
            is_loop,
        });
        let body = self.parse_statement();
        self.jumps.labels.pop();

        let body = body?;
        let span = self.span_from(start);
        Ok(self.push(NodeKind::LabeledStatement { label, body }, span))
    }

    /// Looks past any further `ident :` prefixes for a loop keyword
    fn labelled_body_is_loop(&self) -> bool {
        let mut offset = 0;
        loop {
            match (self.peek_kind(offset), self.peek_kind(offset + 1)) {
                (Some(TokenKind::Identifier(_)), Some(TokenKind::Colon)) => offset += 2,
                (Some(TokenKind::While | TokenKind::Do | TokenKind::For), _) => return true,
                _ => return false,
            }
        }
    }

    // ============ EXPRESSIONS ============

    fn parse_expression(&mut self, no_in: bool) -> Result<NodeId, JsError> {
        let start = self.current().span;
        let first = self.parse_assignment_expression(no_in)?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.match_token(&TokenKind::Comma) {
            expressions.push(self.parse_assignment_expression(no_in)?);
        }
        let span = self.span_from(start);
        Ok(self.push(NodeKind::SequenceExpression { expressions }, span))
    }

    fn parse_assignment_expression(&mut self, no_in: bool) -> Result<NodeId, JsError> {
        let start = self.current().span;
        let target = self.parse_conditional_expression(no_in)?;

        let Some(operator) = self.current_assignment_op() else {
            return Ok(target);
        };
        self.check_assignment_target(target, start, "Invalid left-hand side in assignment")?;
        self.advance();
        let value = self.parse_assignment_expression(no_in)?;
        let span = self.span_from(start);
        Ok(self.push(
            NodeKind::AssignmentExpression {
                operator,
                target,
                value,
            },
            span,
        ))
    }

    fn check_assignment_target(&self, target: NodeId, at: Span, message: &str) -> Result<(), JsError> {
        match self.kind_of(target) {
            Some(NodeKind::Identifier { name }) if name == "eval" || name == "arguments" => {
                Err(JsError::syntax_error(
                    "Unexpected eval or arguments in strict mode",
                    at.line,
                    at.column,
                ))
            }
            Some(kind) if kind.is_reference() => Ok(()),
            _ => Err(JsError::syntax_error(message, at.line, at.column)),
        }
    }

    fn parse_conditional_expression(&mut self, no_in: bool) -> Result<NodeId, JsError> {
        let start = self.current().span;
        let test = self.parse_binary_expression(1, no_in)?;
        if !self.match_token(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment_expression(false)?;
        self.require_token(&TokenKind::Colon)?;
        let alternate = self.parse_assignment_expression(no_in)?;
        let span = self.span_from(start);
        Ok(self.push(
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            },
            span,
        ))
    }

    fn parse_binary_expression(&mut self, min_prec: u8, no_in: bool) -> Result<NodeId, JsError> {
        let start = self.current().span;
        let mut left = self.parse_unary_expression()?;

        while let Some((op, prec)) = self.current_binary_op(no_in) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary_expression(prec + 1, no_in)?;
            let span = self.span_from(start);
            left = match op {
                Operator::Logical(operator) => {
                    self.push(NodeKind::LogicalExpression { operator, left, right }, span)
                }
                Operator::Binary(operator) => {
                    self.push(NodeKind::BinaryExpression { operator, left, right }, span)
                }
            };
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;

        if let Some(operator) = self.current_unary_op() {
            self.advance();
            let argument = self.parse_unary_expression()?;

            if operator == UnaryOp::Delete {
                if let Some(NodeKind::Identifier { name }) = self.kind_of(argument) {
                    return Err(JsError::syntax_error(
                        format!("Delete of an unqualified identifier '{}' in strict mode", name),
                        start.line,
                        start.column,
                    ));
                }
            }

            let span = self.span_from(start);
            return Ok(self.push(NodeKind::UnaryExpression { operator, argument }, span));
        }

        if let Some(operator) = self.current_update_op() {
            self.advance();
            let argument = self.parse_unary_expression()?;
            self.check_assignment_target(argument, start, "Invalid left-hand side expression in prefix operation")?;
            let span = self.span_from(start);
            return Ok(self.push(
                NodeKind::UpdateExpression {
                    operator,
                    prefix: true,
                    argument,
                },
                span,
            ));
        }

        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        let expr = self.parse_left_hand_side_expression()?;

        if !self.current().newline_before {
            if let Some(operator) = self.current_update_op() {
                self.check_assignment_target(expr, start, "Invalid left-hand side expression in postfix operation")?;
                self.advance();
                let span = self.span_from(start);
                return Ok(self.push(
                    NodeKind::UpdateExpression {
                        operator,
                        prefix: false,
                        argument: expr,
                    },
                    span,
                ));
            }
        }

        Ok(expr)
    }

    fn parse_left_hand_side_expression(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        let mut expr = self.parse_new_or_member_expression()?;

        loop {
            if self.check(&TokenKind::LParen) {
                let arguments = self.parse_arguments()?;
                let span = self.span_from(start);
                expr = self.push(NodeKind::CallExpression { callee: expr, arguments }, span);
            } else if let Some(next) = self.parse_member_suffix(expr, start)? {
                expr = next;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// `new` expressions and member access chains, without calls
    fn parse_new_or_member_expression(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        let mut expr = if self.match_token(&TokenKind::New) {
            let callee = self.parse_new_or_member_expression()?;
            let arguments = if self.check(&TokenKind::LParen) {
                self.parse_arguments()?
            } else {
                Vec::new()
            };
            let span = self.span_from(start);
            self.push(NodeKind::NewExpression { callee, arguments }, span)
        } else {
            self.parse_primary_expression()?
        };

        while let Some(next) = self.parse_member_suffix(expr, start)? {
            expr = next;
        }
        Ok(expr)
    }

    fn parse_member_suffix(&mut self, object: NodeId, start: Span) -> Result<Option<NodeId>, JsError> {
        let property = if self.match_token(&TokenKind::Dot) {
            MemberProperty::Named(self.parse_identifier_name()?)
        } else if self.match_token(&TokenKind::LBracket) {
            let key = self.parse_expression(false)?;
            self.require_token(&TokenKind::RBracket)?;
            MemberProperty::Computed(key)
        } else {
            return Ok(None);
        };
        let span = self.span_from(start);
        Ok(Some(self.push(NodeKind::MemberExpression { object, property }, span)))
    }

    fn parse_arguments(&mut self) -> Result<Vec<NodeId>, JsError> {
        self.require_token(&TokenKind::LParen)?;
        let mut arguments = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                arguments.push(self.parse_assignment_expression(false)?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.require_token(&TokenKind::RParen)?;
        Ok(arguments)
    }

    fn parse_primary_expression(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        let kind = match self.current().kind.clone() {
            TokenKind::This => {
                self.advance();
                NodeKind::ThisExpression
            }
            TokenKind::Identifier(name) => {
                self.advance();
                NodeKind::Identifier { name }
            }
            TokenKind::Number(n) => {
                self.advance();
                NodeKind::Literal {
                    value: Literal::Number(n),
                }
            }
            TokenKind::String(s) => {
                self.advance();
                NodeKind::Literal {
                    value: Literal::String(s),
                }
            }
            TokenKind::True | TokenKind::False => {
                let value = self.check(&TokenKind::True);
                self.advance();
                NodeKind::Literal {
                    value: Literal::Boolean(value),
                }
            }
            TokenKind::Null => {
                self.advance();
                NodeKind::Literal {
                    value: Literal::Null,
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression(false)?;
                self.require_token(&TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::LBracket => return self.parse_array_literal(),
            TokenKind::LBrace => return self.parse_object_literal(),
            TokenKind::Function => {
                self.advance();
                let name = if self.check(&TokenKind::LParen) {
                    None
                } else {
                    Some(self.parse_binding_identifier()?)
                };
                let function = self.parse_function_rest(name)?;
                NodeKind::FunctionExpression(function)
            }
            TokenKind::Slash | TokenKind::SlashEq => {
                return Err(self.error("Regular expression literals are not supported"));
            }
            TokenKind::Reserved(word) => {
                return Err(self.error(&format!("Unexpected strict mode reserved word '{}'", word)));
            }
            _ => return Err(self.unexpected_token("expression")),
        };
        let span = self.span_from(start);
        Ok(self.push(kind, span))
    }

    fn parse_array_literal(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::LBracket)?;
        let mut elements = Vec::new();
        loop {
            if self.match_token(&TokenKind::RBracket) {
                break;
            }
            if self.match_token(&TokenKind::Comma) {
                elements.push(None);
                continue;
            }
            elements.push(Some(self.parse_assignment_expression(false)?));
            if !self.check(&TokenKind::RBracket) {
                self.require_token(&TokenKind::Comma)?;
            }
        }
        let span = self.span_from(start);
        Ok(self.push(NodeKind::ArrayExpression { elements }, span))
    }

    fn parse_object_literal(&mut self) -> Result<NodeId, JsError> {
        let start = self.current().span;
        self.require_token(&TokenKind::LBrace)?;
        let mut properties: Vec<PropertyInit> = Vec::new();
        while !self.match_token(&TokenKind::RBrace) {
            let key_span = self.current().span;
            let key = match self.current().kind.clone() {
                TokenKind::String(s) => {
                    self.advance();
                    s
                }
                TokenKind::Number(n) => {
                    self.advance();
                    JsString::from(number_to_string(n))
                }
                _ => self.parse_identifier_name()?,
            };
            if (key == "get" || key == "set") && !self.check(&TokenKind::Colon) {
                return Err(self.error("Accessor properties are not supported"));
            }
            if properties.iter().any(|p| p.key == key) {
                return Err(JsError::syntax_error(
                    format!("Duplicate data property '{}' in object literal", key),
                    key_span.line,
                    key_span.column,
                ));
            }
            self.require_token(&TokenKind::Colon)?;
            let value = self.parse_assignment_expression(false)?;
            properties.push(PropertyInit { key, value });
            if !self.check(&TokenKind::RBrace) {
                self.require_token(&TokenKind::Comma)?;
            }
        }
        let span = self.span_from(start);
        Ok(self.push(NodeKind::ObjectExpression { properties }, span))
    }

    // ============ IDENTIFIERS ============

    /// An identifier that introduces a binding
    fn parse_binding_identifier(&mut self) -> Result<JsString, JsError> {
        match self.current().kind.clone() {
            TokenKind::Identifier(name) => {
                if name == "eval" || name == "arguments" {
                    return Err(self.error("Unexpected eval or arguments in strict mode"));
                }
                self.advance();
                Ok(name)
            }
            TokenKind::Reserved(word) => {
                Err(self.error(&format!("Unexpected strict mode reserved word '{}'", word)))
            }
            _ => Err(self.unexpected_token("identifier")),
        }
    }

    /// IdentifierName: any identifier, keyword or reserved word
    fn parse_identifier_name(&mut self) -> Result<JsString, JsError> {
        let token = self.current().clone();
        let name = match token.kind {
            TokenKind::Identifier(name) | TokenKind::Reserved(name) => name,
            TokenKind::Number(_) | TokenKind::String(_) | TokenKind::Eof => {
                return Err(self.unexpected_token("identifier name"));
            }
            _ => {
                let text = self
                    .source
                    .get(token.span.start..token.span.end)
                    .unwrap_or("");
                if !text.chars().next().is_some_and(|c| c.is_alphabetic()) {
                    return Err(self.unexpected_token("identifier name"));
                }
                JsString::from(text)
            }
        };
        self.advance();
        Ok(name)
    }

    fn hoist_var(&mut self, name: &JsString) {
        if let Some(frame) = self.hoisting.last_mut() {
            if !frame.vars.contains(name) {
                frame.vars.push(name.clone());
            }
        }
    }

    // ============ TOKEN HELPERS ============

    fn current(&self) -> &Token {
        // The token vector always ends with Eof and `pos` never passes it
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    fn is_at_end(&self) -> bool {
        self.check(&TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn require_token(&mut self, kind: &TokenKind) -> Result<(), JsError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected_token(&format!("{:?}", kind)))
        }
    }

    /// True where automatic semicolon insertion would end a statement
    fn at_statement_end(&self) -> bool {
        self.current().newline_before
            || matches!(
                self.current().kind,
                TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
            )
    }

    fn consume_semicolon(&mut self) -> Result<(), JsError> {
        if self.match_token(&TokenKind::Semicolon) || self.at_statement_end() {
            Ok(())
        } else {
            Err(self.unexpected_token("';'"))
        }
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(
            start.start,
            self.previous_end().max(start.start),
            start.line,
            start.column,
        )
    }

    fn error(&self, message: &str) -> JsError {
        JsError::syntax_error(message, self.current().span.line, self.current().span.column)
    }

    fn unexpected_token(&self, expected: &str) -> JsError {
        let found = match &self.current().kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => {
                let span = self.current().span;
                format!("token '{}'", self.source.get(span.start..span.end).unwrap_or(""))
            }
        };
        JsError::syntax_error(
            format!("Unexpected {}, expected {}", found, expected),
            self.current().span.line,
            self.current().span.column,
        )
    }

    fn current_binary_op(&self, no_in: bool) -> Option<(Operator, u8)> {
        let op = match &self.current().kind {
            TokenKind::PipePipe => (Operator::Logical(LogicalOp::Or), 1),
            TokenKind::AmpAmp => (Operator::Logical(LogicalOp::And), 2),
            TokenKind::Pipe => (Operator::Binary(BinaryOp::BitOr), 3),
            TokenKind::Caret => (Operator::Binary(BinaryOp::BitXor), 4),
            TokenKind::Amp => (Operator::Binary(BinaryOp::BitAnd), 5),
            TokenKind::EqEq => (Operator::Binary(BinaryOp::Eq), 6),
            TokenKind::BangEq => (Operator::Binary(BinaryOp::NotEq), 6),
            TokenKind::EqEqEq => (Operator::Binary(BinaryOp::StrictEq), 6),
            TokenKind::BangEqEq => (Operator::Binary(BinaryOp::StrictNotEq), 6),
            TokenKind::Lt => (Operator::Binary(BinaryOp::Lt), 7),
            TokenKind::LtEq => (Operator::Binary(BinaryOp::LtEq), 7),
            TokenKind::Gt => (Operator::Binary(BinaryOp::Gt), 7),
            TokenKind::GtEq => (Operator::Binary(BinaryOp::GtEq), 7),
            TokenKind::Instanceof => (Operator::Binary(BinaryOp::Instanceof), 7),
            TokenKind::In if !no_in => (Operator::Binary(BinaryOp::In), 7),
            TokenKind::LtLt => (Operator::Binary(BinaryOp::LShift), 8),
            TokenKind::GtGt => (Operator::Binary(BinaryOp::RShift), 8),
            TokenKind::GtGtGt => (Operator::Binary(BinaryOp::URShift), 8),
            TokenKind::Plus => (Operator::Binary(BinaryOp::Add), 9),
            TokenKind::Minus => (Operator::Binary(BinaryOp::Sub), 9),
            TokenKind::Star => (Operator::Binary(BinaryOp::Mul), 10),
            TokenKind::Slash => (Operator::Binary(BinaryOp::Div), 10),
            TokenKind::Percent => (Operator::Binary(BinaryOp::Mod), 10),
            _ => return None,
        };
        Some(op)
    }

    fn current_unary_op(&self) -> Option<UnaryOp> {
        match self.current().kind {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        }
    }

    fn current_update_op(&self) -> Option<UpdateOp> {
        match self.current().kind {
            TokenKind::PlusPlus => Some(UpdateOp::Increment),
            TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        }
    }

    fn current_assignment_op(&self) -> Option<AssignmentOp> {
        match self.current().kind {
            TokenKind::Eq => Some(AssignmentOp::Assign),
            TokenKind::PlusEq => Some(AssignmentOp::AddAssign),
            TokenKind::MinusEq => Some(AssignmentOp::SubAssign),
            TokenKind::StarEq => Some(AssignmentOp::MulAssign),
            TokenKind::SlashEq => Some(AssignmentOp::DivAssign),
            TokenKind::PercentEq => Some(AssignmentOp::ModAssign),
            TokenKind::LtLtEq => Some(AssignmentOp::LShiftAssign),
            TokenKind::GtGtEq => Some(AssignmentOp::RShiftAssign),
            TokenKind::GtGtGtEq => Some(AssignmentOp::URShiftAssign),
            TokenKind::AmpEq => Some(AssignmentOp::BitAndAssign),
            TokenKind::PipeEq => Some(AssignmentOp::BitOrAssign),
            TokenKind::CaretEq => Some(AssignmentOp::BitXorAssign),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

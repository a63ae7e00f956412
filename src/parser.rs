use crate::ast::{BinaryOp, LogicalOp, Node, Property, UnaryOp};
use crate::error::{Error, SyntaxError};
use crate::lexer::{Lexer, LexerOptions, Literal, Token};
use crate::types::Value;
use std::collections::{HashMap, VecDeque};

/// Options shared by the lexer and the AST builder.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub lexer: LexerOptions,
    /// Reserved words resolved to constant values at primary-expression position.
    pub literals: HashMap<String, Value>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        let literals = [
            ("true", Value::Boolean(true)),
            ("false", Value::Boolean(false)),
            ("null", Value::Null),
            ("undefined", Value::Undefined),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            lexer: LexerOptions::default(),
            literals,
        }
    }
}

/// Recursive-descent builder over a token queue. Tokens are consumed from the front.
pub struct AstBuilder<'a> {
    text: &'a str,
    tokens: VecDeque<Token>,
    literals: &'a HashMap<String, Value>,
}

impl<'a> AstBuilder<'a> {
    pub fn new(text: &'a str, tokens: Vec<Token>, literals: &'a HashMap<String, Value>) -> Self {
        Self {
            text,
            tokens: tokens.into(),
            literals,
        }
    }

    /// Parse a whole program; fails if tokens remain afterwards.
    pub fn build(mut self) -> Result<Node, SyntaxError> {
        let program = self.program()?;
        if let Some(token) = self.tokens.front() {
            return Err(self.error(token, "is an unexpected token"));
        }
        Ok(program)
    }

    fn error(&self, token: &Token, message: impl Into<String>) -> SyntaxError {
        SyntaxError::Unexpected {
            token: token.text.clone(),
            message: message.into(),
            column: token.index + 1,
            expression: self.text.to_string(),
            remainder: self.text.chars().skip(token.index).collect(),
        }
    }

    fn unexpected_end(&self) -> SyntaxError {
        SyntaxError::UnexpectedEnd {
            expression: self.text.to_string(),
        }
    }

    fn peek(&self, expected: &[&str]) -> Option<&Token> {
        let token = self.tokens.front()?;
        (expected.is_empty() || expected.contains(&token.text.as_str())).then_some(token)
    }

    fn expect(&mut self, expected: &[&str]) -> Option<Token> {
        self.peek(expected)?;
        self.tokens.pop_front()
    }

    fn consume(&mut self, expected: &str) -> Result<Token, SyntaxError> {
        if let Some(token) = self.expect(&[expected]) {
            return Ok(token);
        }
        match self.tokens.front() {
            Some(token) => Err(self.error(token, format!("is unexpected, expecting [{expected}]"))),
            None => Err(self.unexpected_end()),
        }
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.tokens.pop_front().ok_or_else(|| self.unexpected_end())
    }

    fn program(&mut self) -> Result<Node, SyntaxError> {
        let mut body = Vec::new();
        loop {
            if !self.tokens.is_empty() && self.peek(&["}", ")", ";", "]"]).is_none() {
                body.push(Node::ExpressionStatement {
                    expression: Box::new(self.filter_chain()?),
                });
            }
            if self.expect(&[";"]).is_none() {
                return Ok(Node::Program { body });
            }
        }
    }

    fn filter_chain(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.expression()?;
        while self.expect(&["|"]).is_some() {
            left = self.filter(left)?;
        }
        Ok(left)
    }

    fn filter(&mut self, input: Node) -> Result<Node, SyntaxError> {
        let callee = self.identifier()?;
        let mut arguments = vec![input];
        while self.expect(&[":"]).is_some() {
            arguments.push(self.expression()?);
        }
        Ok(Node::Call {
            callee: Box::new(callee),
            arguments,
            filter: true,
        })
    }

    fn expression(&mut self) -> Result<Node, SyntaxError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Node, SyntaxError> {
        let left = self.ternary()?;
        if let Some(token) = self.expect(&["="]) {
            if !left.is_assignable() {
                return Err(SyntaxError::NonAssignable {
                    column: token.index + 1,
                    expression: self.text.to_string(),
                });
            }
            let right = self.assignment()?;
            return Ok(Node::Assignment {
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn ternary(&mut self) -> Result<Node, SyntaxError> {
        let test = self.logical_or()?;
        if self.expect(&["?"]).is_some() {
            let when_true = self.expression()?;
            self.consume(":")?;
            let when_false = self.expression()?;
            return Ok(Node::Conditional {
                test: Box::new(test),
                when_true: Box::new(when_true),
                when_false: Box::new(when_false),
            });
        }
        Ok(test)
    }

    fn logical_or(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.logical_and()?;
        while self.expect(&["||"]).is_some() {
            let right = self.logical_and()?;
            left = Node::Logical {
                operator: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.equality()?;
        while self.expect(&["&&"]).is_some() {
            let right = self.equality()?;
            left = Node::Logical {
                operator: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// One left-associative binary tier: `operand (op operand)*`.
    fn binary_tier(
        &mut self,
        operators: &[&str],
        operand: fn(&mut Self) -> Result<Node, SyntaxError>,
    ) -> Result<Node, SyntaxError> {
        let mut left = operand(self)?;
        while let Some(token) = self.expect(operators) {
            let right = operand(self)?;
            let operator = match BinaryOp::from_symbol(&token.text) {
                Some(op) => op,
                None => return Err(self.error(&token, "is not a binary operator")),
            };
            left = Node::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Node, SyntaxError> {
        self.binary_tier(&["==", "!=", "===", "!=="], Self::relational)
    }

    fn relational(&mut self) -> Result<Node, SyntaxError> {
        self.binary_tier(&["<", ">", "<=", ">="], Self::additive)
    }

    fn additive(&mut self) -> Result<Node, SyntaxError> {
        self.binary_tier(&["+", "-"], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Node, SyntaxError> {
        self.binary_tier(&["*", "/", "%"], Self::unary)
    }

    fn unary(&mut self) -> Result<Node, SyntaxError> {
        if let Some(token) = self.expect(&["+", "-", "!"]) {
            let operator = match UnaryOp::from_symbol(&token.text) {
                Some(op) => op,
                None => return Err(self.error(&token, "is not a unary operator")),
            };
            let argument = self.unary()?;
            return Ok(Node::Unary {
                operator,
                argument: Box::new(argument),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node, SyntaxError> {
        let mut primary = if self.expect(&["("]).is_some() {
            let inner = self.filter_chain()?;
            self.consume(")")?;
            inner
        } else if self.expect(&["["]).is_some() {
            self.array_declaration()?
        } else if self.expect(&["{"]).is_some() {
            self.object()?
        } else {
            let token = self.tokens.front().ok_or_else(|| self.unexpected_end())?;
            if token.text == "this" {
                self.tokens.pop_front();
                Node::This
            } else if token.text == "$locals" {
                self.tokens.pop_front();
                Node::Locals
            } else if let Some(value) = self.literals.get(&token.text) {
                let value = value.clone();
                self.tokens.pop_front();
                Node::Literal { value }
            } else if token.is_identifier() {
                self.identifier()?
            } else if token.is_constant() {
                self.constant()?
            } else {
                return Err(self.error(token, "not a primary expression"));
            }
        };

        while let Some(next) = self.expect(&["(", "[", "."]) {
            primary = match next.text.as_str() {
                "(" => {
                    let arguments = self.arguments()?;
                    self.consume(")")?;
                    Node::Call {
                        callee: Box::new(primary),
                        arguments,
                        filter: false,
                    }
                }
                "[" => {
                    let property = self.expression()?;
                    self.consume("]")?;
                    Node::Member {
                        object: Box::new(primary),
                        property: Box::new(property),
                        computed: true,
                    }
                }
                _ => {
                    let property = self.identifier()?;
                    Node::Member {
                        object: Box::new(primary),
                        property: Box::new(property),
                        computed: false,
                    }
                }
            };
        }
        Ok(primary)
    }

    fn arguments(&mut self) -> Result<Vec<Node>, SyntaxError> {
        let mut args = Vec::new();
        if self.peek(&[")"]).is_none() {
            loop {
                args.push(self.filter_chain()?);
                if self.expect(&[","]).is_none() {
                    break;
                }
            }
        }
        Ok(args)
    }

    fn identifier(&mut self) -> Result<Node, SyntaxError> {
        let token = self.next_token()?;
        if !token.is_identifier() {
            return Err(self.error(&token, "is not a valid identifier"));
        }
        Ok(Node::Identifier { name: token.text })
    }

    fn constant(&mut self) -> Result<Node, SyntaxError> {
        let token = self.next_token()?;
        let value = match token.literal_value() {
            Some(Literal::Number(n)) => Value::Number(*n),
            Some(Literal::String(s)) => Value::String(s.clone()),
            None => return Err(self.error(&token, "is not a constant")),
        };
        Ok(Node::Literal { value })
    }

    fn array_declaration(&mut self) -> Result<Node, SyntaxError> {
        let mut elements = Vec::new();
        if self.peek(&["]"]).is_none() {
            loop {
                // trailing comma
                if self.peek(&["]"]).is_some() {
                    break;
                }
                elements.push(self.expression()?);
                if self.expect(&[","]).is_none() {
                    break;
                }
            }
        }
        self.consume("]")?;
        Ok(Node::Array { elements })
    }

    fn object(&mut self) -> Result<Node, SyntaxError> {
        let mut properties = Vec::new();
        if self.peek(&["}"]).is_none() {
            loop {
                if self.peek(&["}"]).is_some() {
                    break;
                }
                let token = self.tokens.front().ok_or_else(|| self.unexpected_end())?;
                let property = if token.is_constant() {
                    let key = self.constant()?;
                    self.consume(":")?;
                    Property {
                        key,
                        value: self.expression()?,
                        computed: false,
                    }
                } else if token.is_identifier() {
                    let key = self.identifier()?;
                    let value = if self.expect(&[":"]).is_some() {
                        self.expression()?
                    } else {
                        key.clone()
                    };
                    Property {
                        key,
                        value,
                        computed: false,
                    }
                } else if token.text == "[" {
                    self.tokens.pop_front();
                    let key = self.expression()?;
                    self.consume("]")?;
                    self.consume(":")?;
                    Property {
                        key,
                        value: self.expression()?,
                        computed: true,
                    }
                } else {
                    return Err(self.error(token, "invalid key"));
                };
                properties.push(property);
                if self.expect(&[","]).is_none() {
                    break;
                }
            }
        }
        self.consume("}")?;
        Ok(Node::Object { properties })
    }
}

/// Tokenize and parse `text` into a `Program` node.
pub fn parse_program(text: &str, options: &ParseOptions) -> Result<Node, Error> {
    let tokens = Lexer::new(text, &options.lexer).tokenize()?;
    Ok(AstBuilder::new(text, tokens, &options.literals).build()?)
}

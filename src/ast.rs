use crate::types::Value;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Program {
        body: Vec<Node>,
    },
    ExpressionStatement {
        expression: Box<Node>,
    },
    Identifier {
        name: String,
    },
    Literal {
        value: Value,
    },
    This,
    Locals,
    Member {
        object: Box<Node>,
        property: Box<Node>,
        computed: bool,
    },
    Call {
        callee: Box<Node>,
        arguments: Vec<Node>,
        filter: bool,
    },
    Assignment {
        left: Box<Node>,
        right: Box<Node>,
    },
    Conditional {
        test: Box<Node>,
        when_true: Box<Node>,
        when_false: Box<Node>,
    },
    Logical {
        operator: LogicalOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Binary {
        operator: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Unary {
        operator: UnaryOp,
        argument: Box<Node>,
    },
    Array {
        elements: Vec<Node>,
    },
    Object {
        properties: Vec<Property>,
    },
}

/// Object literal entry. Non-computed keys are `Identifier` or `Literal` nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: Node,
    pub value: Node,
    pub computed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => UnaryOp::Plus,
            "-" => UnaryOp::Minus,
            "!" => UnaryOp::Not,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
        }
    }
}

impl LogicalOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "&&" => Some(LogicalOp::And),
            "||" => Some(LogicalOp::Or),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "===" => BinaryOp::StrictEq,
            "!==" => BinaryOp::StrictNe,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
        }
    }
}

impl Node {
    pub fn identifier(name: impl Into<String>) -> Node {
        Node::Identifier { name: name.into() }
    }

    pub fn literal(value: impl Into<Value>) -> Node {
        Node::Literal {
            value: value.into(),
        }
    }

    /// Identifier or member chain: something a value can be written through.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Node::Identifier { .. } | Node::Member { .. })
    }

    /// Statements of a `Program`, or an empty slice for any other node.
    pub fn statements(&self) -> &[Node] {
        match self {
            Node::Program { body } => body,
            _ => &[],
        }
    }

    /// The expression of an `ExpressionStatement`, otherwise the node itself.
    pub fn expression(&self) -> &Node {
        match self {
            Node::ExpressionStatement { expression } => expression,
            other => other,
        }
    }

    fn is_compound(&self) -> bool {
        matches!(
            self,
            Node::Assignment { .. }
                | Node::Conditional { .. }
                | Node::Logical { .. }
                | Node::Binary { .. }
        )
    }
}

struct Operand<'a>(&'a Node);

impl Display for Operand<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_compound() {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

fn write_list(f: &mut Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{node}")?;
    }
    Ok(())
}

/// Renders the node back to expression syntax (used in error messages and the CLI).
impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Node::Program { body } => {
                for (i, statement) in body.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{statement}")?;
                }
                Ok(())
            }
            Node::ExpressionStatement { expression } => write!(f, "{expression}"),
            Node::Identifier { name } => write!(f, "{name}"),
            Node::Literal { value } => match value {
                Value::String(s) => write!(f, "{}", serde_json::Value::String(s.clone())),
                other => write!(f, "{other}"),
            },
            Node::This => write!(f, "this"),
            Node::Locals => write!(f, "$locals"),
            Node::Member {
                object,
                property,
                computed,
            } => {
                if *computed {
                    write!(f, "{}[{}]", Operand(object), property)
                } else {
                    write!(f, "{}.{}", Operand(object), property)
                }
            }
            Node::Call {
                callee,
                arguments,
                filter,
            } => {
                if *filter {
                    let (input, rest) = match arguments.split_first() {
                        Some(split) => split,
                        None => return write!(f, "{callee}"),
                    };
                    write!(f, "{} | {}", Operand(input), callee)?;
                    for arg in rest {
                        write!(f, ":{}", Operand(arg))?;
                    }
                    Ok(())
                } else {
                    write!(f, "{}(", Operand(callee))?;
                    write_list(f, arguments)?;
                    write!(f, ")")
                }
            }
            Node::Assignment { left, right } => write!(f, "{left} = {right}"),
            Node::Conditional {
                test,
                when_true,
                when_false,
            } => write!(
                f,
                "{} ? {} : {}",
                Operand(test),
                Operand(when_true),
                Operand(when_false)
            ),
            Node::Logical {
                operator,
                left,
                right,
            } => write!(f, "{} {} {}", Operand(left), operator.as_str(), Operand(right)),
            Node::Binary {
                operator,
                left,
                right,
            } => write!(f, "{} {} {}", Operand(left), operator.as_str(), Operand(right)),
            Node::Unary { operator, argument } => {
                write!(f, "{}{}", operator.as_str(), Operand(argument))
            }
            Node::Array { elements } => {
                write!(f, "[")?;
                write_list(f, elements)?;
                write!(f, "]")
            }
            Node::Object { properties } => {
                write!(f, "{{")?;
                for (i, prop) in properties.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if prop.computed {
                        write!(f, "[{}]: {}", prop.key, prop.value)?;
                    } else {
                        write!(f, "{}: {}", prop.key, prop.value)?;
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

//! Constant folding eligibility and dirty-check input discovery.

use crate::ast::{BinaryOp, Node};
use crate::compiled::Purity;
use crate::filters::FilterRegistry;

/// A sub-expression the root depends on, with the purity its position gives it.
#[derive(Debug, Clone, Copy)]
pub struct WatchTarget<'a> {
    pub node: &'a Node,
    pub purity: Purity,
}

#[derive(Debug)]
pub struct Analysis<'a> {
    pub constant: bool,
    pub literal: bool,
    /// `None` when the expression must be watched as a whole.
    pub inputs: Option<Vec<WatchTarget<'a>>>,
}

struct NodeInfo<'a> {
    constant: bool,
    to_watch: Vec<WatchTarget<'a>>,
}

fn purity_of(node: &Node, parent: Option<Purity>) -> Purity {
    match node {
        Node::Member { computed: true, .. } => Purity::Impure,
        Node::Unary { .. } => Purity::Absolute,
        Node::Binary { operator, .. } => {
            if *operator == BinaryOp::Add {
                Purity::Impure
            } else {
                Purity::Absolute
            }
        }
        Node::Call { .. } => Purity::Impure,
        _ => parent.unwrap_or(Purity::Relative),
    }
}

fn find<'a>(node: &'a Node, filters: &FilterRegistry, parent: Option<Purity>) -> NodeInfo<'a> {
    let purity = purity_of(node, parent);
    let this = || {
        vec![WatchTarget {
            node,
            purity,
        }]
    };
    match node {
        Node::Program { body } => NodeInfo {
            constant: body
                .iter()
                .map(|statement| find(statement.expression(), filters, Some(purity)).constant)
                .fold(true, |all, c| all && c),
            to_watch: Vec::new(),
        },
        Node::ExpressionStatement { expression } => find(expression, filters, parent),
        Node::Literal { .. } => NodeInfo {
            constant: true,
            to_watch: Vec::new(),
        },
        Node::Unary { argument, .. } => find(argument, filters, Some(purity)),
        Node::Binary { left, right, .. } => {
            let (l, r) = (
                find(left, filters, Some(purity)),
                find(right, filters, Some(purity)),
            );
            let mut to_watch = l.to_watch;
            to_watch.extend(r.to_watch);
            NodeInfo {
                constant: l.constant && r.constant,
                to_watch,
            }
        }
        Node::Logical { left, right, .. } => {
            let constant = find(left, filters, Some(purity)).constant
                & find(right, filters, Some(purity)).constant;
            NodeInfo {
                constant,
                to_watch: if constant { Vec::new() } else { this() },
            }
        }
        Node::Conditional {
            test,
            when_true,
            when_false,
        } => {
            let constant = find(test, filters, Some(purity)).constant
                & find(when_true, filters, Some(purity)).constant
                & find(when_false, filters, Some(purity)).constant;
            NodeInfo {
                constant,
                to_watch: if constant { Vec::new() } else { this() },
            }
        }
        Node::Identifier { .. } => NodeInfo {
            constant: false,
            to_watch: this(),
        },
        Node::Member { .. } => NodeInfo {
            constant: false,
            to_watch: this(),
        },
        Node::Call {
            callee,
            arguments,
            filter,
        } => {
            let stateless_filter = *filter
                && match callee.as_ref() {
                    Node::Identifier { name } => !filters.is_stateful(name),
                    _ => false,
                };
            let to_watch = if stateless_filter {
                arguments
                    .iter()
                    .flat_map(|argument| find(argument, filters, Some(purity)).to_watch)
                    .collect()
            } else {
                this()
            };
            NodeInfo {
                constant: false,
                to_watch,
            }
        }
        Node::Assignment { left, right } => {
            let constant = find(left, filters, Some(purity)).constant
                & find(right, filters, Some(purity)).constant;
            NodeInfo {
                constant,
                to_watch: this(),
            }
        }
        Node::Array { elements } => {
            let mut constant = true;
            let mut to_watch = Vec::new();
            for element in elements {
                let info = find(element, filters, Some(purity));
                constant = constant && info.constant;
                to_watch.extend(info.to_watch);
            }
            NodeInfo { constant, to_watch }
        }
        Node::Object { properties } => {
            let mut constant = true;
            let mut to_watch = Vec::new();
            for property in properties {
                let info = find(&property.value, filters, Some(purity));
                constant = constant && info.constant;
                to_watch.extend(info.to_watch);
                if property.computed {
                    let key = find(&property.key, filters, Some(Purity::Impure));
                    constant = constant && key.constant;
                    to_watch.extend(key.to_watch);
                }
            }
            NodeInfo { constant, to_watch }
        }
        Node::This | Node::Locals => NodeInfo {
            constant: false,
            to_watch: Vec::new(),
        },
    }
}

/// Classify a `Program` node. `filters` decides which filter calls are stateless.
pub fn analyze<'a>(program: &'a Node, filters: &FilterRegistry) -> Analysis<'a> {
    let body = program.statements();
    let constant = find(program, filters, None).constant;
    let literal = match body {
        [] => true,
        [statement] => matches!(
            statement.expression(),
            Node::Literal { .. } | Node::Array { .. } | Node::Object { .. }
        ),
        _ => false,
    };
    let inputs = match body {
        [statement] => {
            let root = statement.expression();
            let candidates = find(root, filters, Some(Purity::Relative)).to_watch;
            match candidates.as_slice() {
                [] => None,
                [only] if std::ptr::eq(only.node, root) => None,
                _ => Some(candidates),
            }
        }
        _ => None,
    };
    Analysis {
        constant,
        literal,
        inputs,
    }
}

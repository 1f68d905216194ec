//! Abstract Syntax Tree types
//!
//! The tree is stored flat: every node of a parsed program lives in
//! [`Program::nodes`] and children are referenced by [`NodeId`]. Execution
//! states point into a program with a [`NodeRef`], which is plain data and
//! survives a snapshot round trip. Programs themselves serialize through serde
//! so a snapshot can carry the source it was running.

use serde::{Deserialize, Serialize};

use crate::error::JsError;
use crate::lexer::Span;
use crate::value::JsString;

/// Index of a node within its program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Handle of a loaded program in the interpreter's heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// A node within a specific loaded program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub program: ProgramId,
    pub node: NodeId,
}

/// A parsed script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Original source text, used by `Function.prototype.toString`
    pub source: String,
    pub nodes: Vec<Node>,
    pub root: NodeId,
}

impl Program {
    pub fn node(&self, id: NodeId) -> Result<&Node, JsError> {
        self.nodes
            .get(id.0 as usize)
            .ok_or_else(|| JsError::host_fault(format!("AST node {} out of range", id.0)))
    }

    pub fn kind(&self, id: NodeId) -> Result<&NodeKind, JsError> {
        self.node(id).map(|n| &n.kind)
    }

    /// Source text covered by a node
    pub fn text(&self, id: NodeId) -> &str {
        self.nodes
            .get(id.0 as usize)
            .and_then(|n| self.source.get(n.span.start..n.span.end))
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

/// Declarations hoisted to the top of a function body or program
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hoisted {
    /// `var` names in declaration order, deduplicated
    pub vars: Vec<JsString>,
    /// Function declaration nodes in source order
    pub functions: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: Option<JsString>,
    pub params: Vec<JsString>,
    /// A `BlockStatement`
    pub body: NodeId,
    pub hoisted: Hoisted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub param: JsString,
    pub body: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<NodeId>,
    pub consequent: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyInit {
    pub key: JsString,
    pub value: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MemberProperty {
    Named(JsString),
    Computed(NodeId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(#[serde(with = "number_literal")] f64),
    String(JsString),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    Program {
        body: Vec<NodeId>,
        hoisted: Hoisted,
    },

    // ============ STATEMENTS ============
    ExpressionStatement {
        expression: NodeId,
    },
    BlockStatement {
        body: Vec<NodeId>,
    },
    EmptyStatement,
    DebuggerStatement,
    VariableDeclaration {
        declarations: Vec<NodeId>,
    },
    VariableDeclarator {
        name: JsString,
        init: Option<NodeId>,
    },
    FunctionDeclaration(Function),
    IfStatement {
        test: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    },
    LabeledStatement {
        label: JsString,
        body: NodeId,
    },
    BreakStatement {
        label: Option<JsString>,
    },
    ContinueStatement {
        label: Option<JsString>,
    },
    ReturnStatement {
        argument: Option<NodeId>,
    },
    ThrowStatement {
        argument: NodeId,
    },
    TryStatement {
        block: NodeId,
        handler: Option<CatchClause>,
        finalizer: Option<NodeId>,
    },
    SwitchStatement {
        discriminant: NodeId,
        cases: Vec<SwitchCase>,
    },
    WhileStatement {
        test: NodeId,
        body: NodeId,
    },
    DoWhileStatement {
        body: NodeId,
        test: NodeId,
    },
    ForStatement {
        init: Option<NodeId>,
        test: Option<NodeId>,
        update: Option<NodeId>,
        body: NodeId,
    },
    /// `left` is a single-declarator `VariableDeclaration` or an assignable
    /// expression
    ForInStatement {
        left: NodeId,
        right: NodeId,
        body: NodeId,
    },

    // ============ EXPRESSIONS ============
    Identifier {
        name: JsString,
    },
    Literal {
        value: Literal,
    },
    ThisExpression,
    ArrayExpression {
        elements: Vec<Option<NodeId>>,
    },
    ObjectExpression {
        properties: Vec<PropertyInit>,
    },
    FunctionExpression(Function),
    UnaryExpression {
        operator: UnaryOp,
        argument: NodeId,
    },
    UpdateExpression {
        operator: UpdateOp,
        prefix: bool,
        argument: NodeId,
    },
    BinaryExpression {
        operator: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    LogicalExpression {
        operator: LogicalOp,
        left: NodeId,
        right: NodeId,
    },
    AssignmentExpression {
        operator: AssignmentOp,
        target: NodeId,
        value: NodeId,
    },
    ConditionalExpression {
        test: NodeId,
        consequent: NodeId,
        alternate: NodeId,
    },
    CallExpression {
        callee: NodeId,
        arguments: Vec<NodeId>,
    },
    NewExpression {
        callee: NodeId,
        arguments: Vec<NodeId>,
    },
    MemberExpression {
        object: NodeId,
        property: MemberProperty,
    },
    SequenceExpression {
        expressions: Vec<NodeId>,
    },
}

impl NodeKind {
    /// Whether this node may appear as an assignment target
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            NodeKind::Identifier { .. } | NodeKind::MemberExpression { .. }
        )
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            NodeKind::WhileStatement { .. }
                | NodeKind::DoWhileStatement { .. }
                | NodeKind::ForStatement { .. }
                | NodeKind::ForInStatement { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Minus,  // -
    Plus,   // +
    Not,    // !
    BitNot, // ~
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOp {
    Increment, // ++
    Decrement, // --
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Mod, // %

    // Comparison
    Eq,          // ==
    NotEq,       // !=
    StrictEq,    // ===
    StrictNotEq, // !==
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=

    // Bitwise
    BitAnd,  // &
    BitOr,   // |
    BitXor,  // ^
    LShift,  // <<
    RShift,  // >>
    URShift, // >>>

    // Other
    In,
    Instanceof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And, // &&
    Or,  // ||
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentOp {
    Assign,        // =
    AddAssign,     // +=
    SubAssign,     // -=
    MulAssign,     // *=
    DivAssign,     // /=
    ModAssign,     // %=
    LShiftAssign,  // <<=
    RShiftAssign,  // >>=
    URShiftAssign, // >>>=
    BitAndAssign,  // &=
    BitOrAssign,   // |=
    BitXorAssign,  // ^=
}

impl AssignmentOp {
    /// The binary operator a compound assignment applies
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignmentOp::Assign => None,
            AssignmentOp::AddAssign => Some(BinaryOp::Add),
            AssignmentOp::SubAssign => Some(BinaryOp::Sub),
            AssignmentOp::MulAssign => Some(BinaryOp::Mul),
            AssignmentOp::DivAssign => Some(BinaryOp::Div),
            AssignmentOp::ModAssign => Some(BinaryOp::Mod),
            AssignmentOp::LShiftAssign => Some(BinaryOp::LShift),
            AssignmentOp::RShiftAssign => Some(BinaryOp::RShift),
            AssignmentOp::URShiftAssign => Some(BinaryOp::URShift),
            AssignmentOp::BitAndAssign => Some(BinaryOp::BitAnd),
            AssignmentOp::BitOrAssign => Some(BinaryOp::BitOr),
            AssignmentOp::BitXorAssign => Some(BinaryOp::BitXor),
        }
    }
}

/// JSON cannot carry non-finite numbers, and `1e400` is a legal literal
mod number_literal {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str("Infinity")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Finite(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Finite(n) => Ok(n),
            Repr::Text(t) if t == "Infinity" => Ok(f64::INFINITY),
            Repr::Text(t) => Err(serde::de::Error::custom(format!(
                "invalid number literal '{}'",
                t
            ))),
        }
    }
}

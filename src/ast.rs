//! Abstract syntax tree for NBCPL.
//!
//! The tree is strictly parent-owns-children (spec.md §3, §5, §9): side
//! tables (symbol table, class table, function metrics) reference nodes by
//! [`NodeId`], never by pointer, so AST storage can be relocated freely and
//! so later passes annotate rather than mutate.

use crate::types::{VarType, Visibility};

/// A stable identifier for an AST node, used as the key for side-table
/// annotations (inferred type, resolved symbol, …) instead of a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Monotonic id generator owned by the parser; one counter per parse.
#[derive(Debug, Default)]
pub struct NodeIdGen(u32);

impl NodeIdGen {
    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.0);
        self.0 += 1;
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        SourceLocation { line, column }
    }
}

/// The full parsed program: a flat sequence of top-level declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub declarations: Vec<Declaration>,
}

// ============================================================================
//                              DECLARATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Let(LetDeclaration),
    Function(FunctionDeclaration),
    Routine(RoutineDeclaration),
    Class(ClassDeclaration),
    Manifest(ManifestDeclaration),
    Static(StaticDeclaration),
    Global(GlobalDeclaration),
    GlobalVariable(GlobalVariableDeclaration),
    Label(LabelDeclaration),
}

impl Declaration {
    pub fn id(&self) -> NodeId {
        match self {
            Declaration::Let(d) => d.id,
            Declaration::Function(d) => d.id,
            Declaration::Routine(d) => d.id,
            Declaration::Class(d) => d.id,
            Declaration::Manifest(d) => d.id,
            Declaration::Static(d) => d.id,
            Declaration::Global(d) => d.id,
            Declaration::GlobalVariable(d) => d.id,
            Declaration::Label(d) => d.id,
        }
    }
}

/// `LET n1, n2, … = e1, e2, …` — also used, without initializers, as the
/// declaration half of a block-scoped `LET` lowering (spec.md §4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct LetDeclaration {
    pub id: NodeId,
    pub names: Vec<String>,
    pub initializers: Vec<Expression>,
    pub is_float: bool,
    pub is_retained: bool,
    pub explicit_type: Option<VarType>,
    pub location: SourceLocation,
}

/// `LET name ( params ) = expr` — value-producing.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub id: NodeId,
    pub name: String,
    pub params: Vec<String>,
    pub body: Expression,
    pub is_float: bool,
    pub is_virtual: bool,
    pub is_final: bool,
    pub location: SourceLocation,
}

/// `LET name ( params ) BE stmt` — no value.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineDeclaration {
    pub id: NodeId,
    pub name: String,
    pub params: Vec<String>,
    pub body: Statement,
    pub is_virtual: bool,
    pub is_final: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberVariable {
    pub name: String,
    pub visibility: Visibility,
    pub is_float: bool,
    pub explicit_type: Option<VarType>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Variable(MemberVariable),
    Method(ClassMethod),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMethod {
    pub visibility: Visibility,
    pub is_virtual: bool,
    pub is_final: bool,
    pub function: Option<FunctionDeclaration>,
    pub routine: Option<RoutineDeclaration>,
}

impl ClassMethod {
    pub fn name(&self) -> &str {
        self.function
            .as_ref()
            .map(|f| f.name.as_str())
            .or_else(|| self.routine.as_ref().map(|r| r.name.as_str()))
            .expect("ClassMethod always carries a function or routine")
    }

    pub fn param_count(&self) -> usize {
        self.function
            .as_ref()
            .map(|f| f.params.len())
            .or_else(|| self.routine.as_ref().map(|r| r.params.len()))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDeclaration {
    pub id: NodeId,
    pub name: String,
    pub parent_name: Option<String>,
    pub members: Vec<ClassMember>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDeclaration {
    pub id: NodeId,
    pub name: String,
    pub value: i64,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticDeclaration {
    pub id: NodeId,
    pub names: Vec<String>,
    pub initializers: Vec<Expression>,
    pub is_float: bool,
    pub location: SourceLocation,
}

/// `GLOBAL name` — a single global declared outside a `GLOBALS` block.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDeclaration {
    pub id: NodeId,
    pub name: String,
    pub slot: Option<i64>,
    pub location: SourceLocation,
}

/// One entry flattened out of a `GLOBALS { … }` block (spec.md §4.3,
/// SPEC_FULL.md). Always owned by the `"Global"` sentinel function.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariableDeclaration {
    pub id: NodeId,
    pub name: String,
    pub slot: Option<i64>,
    pub is_float: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelDeclaration {
    pub id: NodeId,
    pub name: String,
    pub location: SourceLocation,
}

// ============================================================================
//                               STATEMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment(Assignment),
    RoutineCall(Expression),
    If(IfStatement),
    Unless(UnlessStatement),
    Test(TestStatement),
    While(WhileStatement),
    Until(UntilStatement),
    Repeat(RepeatStatement),
    For(ForStatement),
    ForEach(ForEachStatement),
    Switchon(SwitchonStatement),
    Goto(Expression),
    Return,
    Finish,
    Break,
    /// `BRK` — a debugger trap, distinct from the loop-exiting `BREAK`.
    Brk,
    Loop,
    Endcase,
    Resultis(Expression),
    Defer(Box<Statement>),
    Retain(Vec<String>),
    Remanage(Vec<String>),
    Free(Expression),
    Block(BlockStatement),
    Compound(CompoundStatement),
    LabelTarget(String),
    /// Evaluates an expression purely for the variables/calls it reads, with
    /// no binding. The parser never produces this; CFG construction
    /// synthesizes it to record a branch/loop condition or switch selector
    /// as a use in the block that evaluates it (spec.md §4.4).
    Evaluate(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub lhs: Vec<Expression>,
    pub rhs: Vec<Expression>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_branch: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnlessStatement {
    pub condition: Expression,
    pub then_branch: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestStatement {
    pub condition: Expression,
    pub then_branch: Box<Statement>,
    pub else_branch: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    pub condition: Expression,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UntilStatement {
    pub condition: Expression,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatKind {
    Repeat,
    RepeatWhile,
    RepeatUntil,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepeatStatement {
    pub kind: RepeatKind,
    pub body: Box<Statement>,
    pub condition: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub var_name: String,
    pub from: Expression,
    pub to: Expression,
    pub by: Option<Expression>,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForEachStatement {
    pub tag_var: Option<String>,
    pub value_var: String,
    /// `FOREACH (a, b) IN coll` destructuring form.
    pub destructure_vars: Option<(String, String)>,
    pub collection: Expression,
    pub type_filter: Option<VarType>,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub value: i64,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchonStatement {
    pub selector: Expression,
    pub cases: Vec<SwitchCase>,
    pub default: Option<Box<Statement>>,
}

/// A lexical scope: a declaration list plus a statement list. `LET` lowers
/// here as a pair: a bare declaration and the corresponding assignment
/// statement (spec.md §4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub declarations: Vec<Declaration>,
    pub statements: Vec<Statement>,
}

/// Statements only, no new lexical scope (e.g. the branch of a `TEST`).
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundStatement {
    pub statements: Vec<Statement>,
}

// ============================================================================
//                              EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    LogicalAnd,
    LogicalOr,
    Xor,
    Eqv,
    Neqv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Neg,
    AddressOf, // @
    Fix,
    FloatOf,
    Abs,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    IntLiteral {
        id: NodeId,
        value: i64,
    },
    FloatLiteral {
        id: NodeId,
        value: f64,
    },
    StringLiteral {
        id: NodeId,
        value: String,
    },
    CharLiteral {
        id: NodeId,
        value: char,
    },
    BoolLiteral {
        id: NodeId,
        value: bool,
    },
    NullLiteral {
        id: NodeId,
    },
    VariableAccess {
        id: NodeId,
        name: String,
        location: SourceLocation,
    },
    BinaryOp {
        id: NodeId,
        op: BinaryOperator,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    UnaryOp {
        id: NodeId,
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    /// Prefix (`!e`) and infix (`e!idx`) vector indirection collapse to one
    /// node with an optional index: `None` is the prefix form.
    VectorAccess {
        id: NodeId,
        base: Box<Expression>,
        index: Option<Box<Expression>>,
    },
    CharIndirection {
        id: NodeId,
        base: Box<Expression>,
        index: Option<Box<Expression>>,
    },
    Bitfield {
        id: NodeId,
        base: Box<Expression>,
        offset: Box<Expression>,
        width: Box<Expression>,
    },
    FunctionCall {
        id: NodeId,
        callee: Box<Expression>,
        args: Vec<Expression>,
        location: SourceLocation,
    },
    ConditionalExpression {
        id: NodeId,
        condition: Box<Expression>,
        then_value: Box<Expression>,
        else_value: Box<Expression>,
    },
    ValofExpression {
        id: NodeId,
        body: Box<Statement>,
    },
    FloatValofExpression {
        id: NodeId,
        body: Box<Statement>,
    },
    VecAllocation {
        id: NodeId,
        size: Box<Expression>,
        is_float: bool,
    },
    TableExpression {
        id: NodeId,
        entries: Vec<Expression>,
        is_float: bool,
    },
    ListExpression {
        id: NodeId,
        entries: Vec<Expression>,
        is_manifest: bool,
    },
    MemberAccessExpression {
        id: NodeId,
        object: Box<Expression>,
        member: String,
        location: SourceLocation,
    },
    SuperMethodAccessExpression {
        id: NodeId,
        method: String,
        args: Vec<Expression>,
        location: SourceLocation,
    },
    NewExpression {
        id: NodeId,
        class_name: String,
        args: Vec<Expression>,
        location: SourceLocation,
    },
}

impl Expression {
    pub fn id(&self) -> NodeId {
        match self {
            Expression::IntLiteral { id, .. }
            | Expression::FloatLiteral { id, .. }
            | Expression::StringLiteral { id, .. }
            | Expression::CharLiteral { id, .. }
            | Expression::BoolLiteral { id, .. }
            | Expression::NullLiteral { id }
            | Expression::VariableAccess { id, .. }
            | Expression::BinaryOp { id, .. }
            | Expression::UnaryOp { id, .. }
            | Expression::VectorAccess { id, .. }
            | Expression::CharIndirection { id, .. }
            | Expression::Bitfield { id, .. }
            | Expression::FunctionCall { id, .. }
            | Expression::ConditionalExpression { id, .. }
            | Expression::ValofExpression { id, .. }
            | Expression::FloatValofExpression { id, .. }
            | Expression::VecAllocation { id, .. }
            | Expression::TableExpression { id, .. }
            | Expression::ListExpression { id, .. }
            | Expression::MemberAccessExpression { id, .. }
            | Expression::SuperMethodAccessExpression { id, .. }
            | Expression::NewExpression { id, .. } => *id,
        }
    }

    pub fn is_function_call(&self) -> bool {
        matches!(self, Expression::FunctionCall { .. })
    }
}

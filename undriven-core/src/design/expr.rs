//! Bound expressions and statements.
//!
//! These trees come out of binding and type checking. They carry just enough
//! structure for access classification: assignment targets vs sources, call
//! targets (whose argument directions are known), selects, member accesses,
//! method-call receivers, construction sites and event operands.

use serde::{Deserialize, Serialize};

use super::decl::DataType;
use super::{DeclId, ScopeId};

/// Callee of a call expression, already resolved by elaboration.
///
/// Virtual dispatch is resolved upstream; a call site always names one body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallTarget {
    /// User function, task or DPI import (argument declarations live in the scope)
    Subroutine(ScopeId),
    /// Built-in system task/function such as `$cast`, `$sscanf` or `std::randomize`
    System(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal,
    Null,
    /// Simple reference to a named value
    Name(DeclId),
    /// Hierarchical reference bound statically to its target, e.g. `m.y`
    Hierarchical { path: Vec<String>, target: DeclId },
    /// Reference to an instance or other named scope as a value
    /// (virtual interface assignment, `i.clk`, `vif.cb`)
    Instance(ScopeId),
    /// Bit, part, indexed part or element select
    Select { base: Box<Expr>, indices: Vec<Expr> },
    /// `base.member`: struct field, handle member, or scope member
    Member { base: Box<Expr>, member: String },
    /// `{a, b}`; also valid as an assignment target
    Concat(Vec<Expr>),
    /// Unary, binary and other pure operators
    Operation(Vec<Expr>),
    Conditional {
        cond: Box<Expr>,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Assignment used as an expression, including compound operators
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        #[serde(default)]
        compound: bool,
    },
    /// `x++`, `--x`
    IncDec(Box<Expr>),
    Call {
        target: CallTarget,
        #[serde(default)]
        args: Vec<Option<Expr>>,
    },
    /// `receiver.method(args)`. `target` names the class method body when
    /// elaboration resolved one; built-in methods have none.
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default)]
        target: Option<ScopeId>,
    },
    /// `new` / `new(...)`; `class` is the constructed class or covergroup
    New {
        #[serde(default)]
        class: Option<ScopeId>,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Enumerator reference; uses the typedef that declared the enum
    EnumValue {
        #[serde(default)]
        typedef: Option<DeclId>,
    },
    /// `T::member` through a typedef, type parameter or class type
    ScopedName { prefix: DataType, target: DeclId },
    Cast { ty: DataType, operand: Box<Expr> },
    /// Type used as an operand (`$bits(T)`, type comparisons)
    TypeOperand(DataType),
}

impl Expr {
    pub fn name(id: DeclId) -> Self {
        Self::Name(id)
    }

    pub fn select(base: Expr, indices: Vec<Expr>) -> Self {
        Self::Select {
            base: Box::new(base),
            indices,
        }
    }

    pub fn member(base: Expr, member: impl Into<String>) -> Self {
        Self::Member {
            base: Box::new(base),
            member: member.into(),
        }
    }

    pub fn op(operands: Vec<Expr>) -> Self {
        Self::Operation(operands)
    }

    pub fn call(target: ScopeId, args: Vec<Expr>) -> Self {
        Self::Call {
            target: CallTarget::Subroutine(target),
            args: args.into_iter().map(Some).collect(),
        }
    }

    pub fn system(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            target: CallTarget::System(name.into()),
            args: args.into_iter().map(Some).collect(),
        }
    }

    pub fn method(receiver: Expr, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::MethodCall {
            receiver: Box::new(receiver),
            method: method.into(),
            args,
            target: None,
        }
    }

    pub fn new_object(class: Option<ScopeId>) -> Self {
        Self::New {
            class,
            args: Vec::new(),
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::New { .. })
    }

    /// Direct sub-expressions, in source order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Self::Literal
            | Self::Null
            | Self::Name(_)
            | Self::Hierarchical { .. }
            | Self::Instance(_)
            | Self::EnumValue { .. }
            | Self::ScopedName { .. }
            | Self::TypeOperand(_) => Vec::new(),
            Self::Select { base, indices } => {
                let mut out = vec![base.as_ref()];
                out.extend(indices.iter());
                out
            }
            Self::Member { base, .. } => vec![base.as_ref()],
            Self::Concat(items) | Self::Operation(items) => items.iter().collect(),
            Self::Conditional { cond, left, right } => {
                vec![cond.as_ref(), left.as_ref(), right.as_ref()]
            }
            Self::Assign { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            Self::IncDec(operand) => vec![operand.as_ref()],
            Self::Call { args, .. } => args.iter().flatten().collect(),
            Self::MethodCall { receiver, args, .. } => {
                let mut out = vec![receiver.as_ref()];
                out.extend(args.iter());
                out
            }
            Self::New { args, .. } => args.iter().collect(),
            Self::Cast { operand, .. } => vec![operand.as_ref()],
        }
    }

    /// Pre-order walk over this expression and all sub-expressions.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}

/// Event control operand: `@(posedge clk iff en)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventExpr {
    pub expr: Expr,
    #[serde(default)]
    pub iff: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    /// `#delay`
    Delay(Expr),
    /// `##cycles` clocking delay
    Cycles(Expr),
    /// `@(...)`
    Event(Vec<EventExpr>),
}

impl Timing {
    pub fn wait_on(expr: Expr) -> Self {
        Self::Event(vec![EventExpr { expr, iff: None }])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    While,
    DoWhile,
    Repeat,
    Forever,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseItem {
    pub labels: Vec<Expr>,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Empty,
    Expr(Expr),
    /// `begin ... end` with its local declarations
    Block {
        #[serde(default)]
        locals: Vec<DeclId>,
        body: Vec<Stmt>,
    },
    /// Blocking or nonblocking assignment, optionally with an intra-assignment
    /// delay (`x <= #1 y`, `cb.a <= ##1 y`)
    Assign {
        lhs: Expr,
        rhs: Expr,
        #[serde(default)]
        timing: Option<Timing>,
    },
    If {
        cond: Expr,
        then: Box<Stmt>,
        #[serde(default)]
        otherwise: Option<Box<Stmt>>,
    },
    Case {
        subject: Expr,
        items: Vec<CaseItem>,
        #[serde(default)]
        default: Option<Box<Stmt>>,
    },
    Loop {
        kind: LoopKind,
        #[serde(default)]
        cond: Option<Expr>,
        body: Box<Stmt>,
    },
    For {
        #[serde(default)]
        locals: Vec<DeclId>,
        #[serde(default)]
        cond: Option<Expr>,
        #[serde(default)]
        steps: Vec<Expr>,
        body: Box<Stmt>,
    },
    Foreach {
        array: Expr,
        loop_vars: Vec<DeclId>,
        body: Box<Stmt>,
    },
    Timed { timing: Timing, body: Box<Stmt> },
    Wait { cond: Expr, body: Box<Stmt> },
    /// `-> e`
    Trigger(Expr),
    Return(Option<Expr>),
    Assert {
        cond: Expr,
        #[serde(default)]
        action: Option<Box<Stmt>>,
    },
}

impl Stmt {
    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Self::Assign {
            lhs,
            rhs,
            timing: None,
        }
    }

    pub fn block(body: Vec<Stmt>) -> Self {
        Self::Block {
            locals: Vec::new(),
            body,
        }
    }

    /// Declarations introduced directly by this statement.
    pub fn local_decls(&self) -> &[DeclId] {
        match self {
            Self::Block { locals, .. } | Self::For { locals, .. } => locals,
            Self::Foreach { loop_vars, .. } => loop_vars,
            _ => &[],
        }
    }

    /// Expressions and nested statements held directly by this statement.
    pub fn parts(&self) -> (Vec<&Expr>, Vec<&Stmt>) {
        match self {
            Self::Empty => (Vec::new(), Vec::new()),
            Self::Expr(e) | Self::Trigger(e) => (vec![e], Vec::new()),
            Self::Return(e) => (e.iter().collect(), Vec::new()),
            Self::Block { body, .. } => (Vec::new(), body.iter().collect()),
            Self::Assign { lhs, rhs, timing } => {
                let mut exprs = vec![lhs, rhs];
                if let Some(t) = timing {
                    exprs.extend(timing_exprs(t));
                }
                (exprs, Vec::new())
            }
            Self::If {
                cond,
                then,
                otherwise,
            } => {
                let mut stmts = vec![then.as_ref()];
                stmts.extend(otherwise.as_deref());
                (vec![cond], stmts)
            }
            Self::Case {
                subject,
                items,
                default,
            } => {
                let mut exprs = vec![subject];
                let mut stmts = Vec::new();
                for item in items {
                    exprs.extend(item.labels.iter());
                    stmts.push(&item.body);
                }
                stmts.extend(default.as_deref());
                (exprs, stmts)
            }
            Self::Loop { cond, body, .. } => (cond.iter().collect(), vec![body.as_ref()]),
            Self::For {
                cond, steps, body, ..
            } => {
                let mut exprs: Vec<&Expr> = cond.iter().collect();
                exprs.extend(steps.iter());
                (exprs, vec![body.as_ref()])
            }
            Self::Foreach { array, body, .. } => (vec![array], vec![body.as_ref()]),
            Self::Timed { timing, body } => (timing_exprs(timing), vec![body.as_ref()]),
            Self::Wait { cond, body } => (vec![cond], vec![body.as_ref()]),
            Self::Assert { cond, action } => (vec![cond], action.iter().map(|s| s.as_ref()).collect()),
        }
    }
}

pub(crate) fn timing_exprs(timing: &Timing) -> Vec<&Expr> {
    match timing {
        Timing::Delay(e) | Timing::Cycles(e) => vec![e],
        Timing::Event(events) => events
            .iter()
            .flat_map(|ev| std::iter::once(&ev.expr).chain(ev.iff.iter()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_visits_nested_operands() {
        let expr = Expr::op(vec![
            Expr::Name(DeclId(1)),
            Expr::select(Expr::Name(DeclId(2)), vec![Expr::Name(DeclId(3))]),
        ]);
        let mut names = Vec::new();
        expr.walk(&mut |e| {
            if let Expr::Name(id) = e {
                names.push(id.0);
            }
        });
        assert_eq!(names, vec![1, 2, 3]);
    }

    #[test]
    fn test_call_children_skip_empty_arguments() {
        let call = Expr::Call {
            target: CallTarget::System("$fwrite".into()),
            args: vec![None, Some(Expr::Name(DeclId(5)))],
        };
        assert_eq!(call.children().len(), 1);
    }

    #[test]
    fn test_stmt_parts_include_timing() {
        let stmt = Stmt::Timed {
            timing: Timing::Event(vec![EventExpr {
                expr: Expr::Name(DeclId(0)),
                iff: Some(Expr::Name(DeclId(1))),
            }]),
            body: Box::new(Stmt::Empty),
        };
        let (exprs, stmts) = stmt.parts();
        assert_eq!(exprs.len(), 2);
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_expr_json_shape() {
        let expr = Expr::member(Expr::Name(DeclId(2)), "clk");
        let json = serde_json::to_string(&expr).unwrap();
        assert_eq!(json, r#"{"member":{"base":{"name":2},"member":"clk"}}"#);
        let back: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
    }
}

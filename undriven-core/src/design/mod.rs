//! Elaborated design model.
//!
//! This is the contract with the elaboration stage: a fully resolved instance
//! tree plus bound, type-checked statements and expressions. The analysis only
//! reads it.
//!
//! # Layout
//!
//! ```text
//! Design
//!   ├── decls:  [Declaration]   indexed by DeclId (definition-level, shared by instances)
//!   ├── scopes: [ScopeNode]     indexed by ScopeId (one per elaborated instance/block)
//!   ├── definitions             every module/interface/program, source order
//!   ├── tops                    definitions elaborated as roots
//!   └── roots                   root scopes: compilation units, top instance bodies
//! ```
//!
//! Ids are plain arena indices. [`Design::validate`] checks every id against
//! the arenas once, after which the accessors index without checks.

pub mod builder;
pub mod decl;
pub mod expr;
pub mod scope;

pub use builder::DesignBuilder;
pub use decl::{
    Container, ContainerType, DataType, DeclKind, Declaration, DefinitionKind, Direction,
    SourceLocation, SubroutineInfo, Suppression,
};
pub use expr::{CallTarget, CaseItem, EventExpr, Expr, LoopKind, Stmt, Timing};
pub use scope::{Instance, Member, PortConnection, ProcedureKind, ScopeKind, ScopeNode};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{UndrivenError, UndrivenResult};

/// Index of a declaration in [`Design::decls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(pub u32);

/// Index of a scope in [`Design::scopes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Design {
    pub decls: Vec<Declaration>,
    pub scopes: Vec<ScopeNode>,
    #[serde(default)]
    pub definitions: Vec<DeclId>,
    #[serde(default)]
    pub tops: Vec<DeclId>,
    #[serde(default)]
    pub roots: Vec<ScopeId>,
}

impl Design {
    pub fn decl(&self, id: DeclId) -> &Declaration {
        &self.decls[id.index()]
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeNode {
        &self.scopes[id.index()]
    }

    pub fn is_top(&self, def: DeclId) -> bool {
        self.tops.contains(&def)
    }

    /// Argument declarations of a subroutine scope, in signature order.
    pub fn arguments(&self, subroutine: ScopeId) -> Vec<DeclId> {
        self.scope(subroutine)
            .decls()
            .filter(|id| matches!(self.decl(*id).kind, DeclKind::Argument { .. }))
            .collect()
    }

    /// Checks that every id in the design refers into its arena and that
    /// definition references name definitions.
    ///
    /// Errors are labelled `<design>`; loaders relabel them with the file.
    pub fn validate(&self) -> UndrivenResult<()> {
        self.check_ids()
            .map_err(|e| UndrivenError::design("<design>", e))
    }

    fn check_ids(&self) -> Result<(), String> {
        let check = Checker { design: self };

        for (i, decl) in self.decls.iter().enumerate() {
            check
                .decl_shape(decl)
                .map_err(|e| format!("declaration {} '{}': {}", i, decl.name, e))?;
        }
        for (i, scope) in self.scopes.iter().enumerate() {
            check
                .scope_shape(scope)
                .map_err(|e| format!("scope {} '{}': {}", i, scope.name, e))?;
        }
        for id in self.definitions.iter().chain(self.tops.iter()) {
            check.definition(*id)?;
        }
        for id in &self.roots {
            check.scope(*id)?;
        }
        Ok(())
    }
}

struct Checker<'d> {
    design: &'d Design,
}

impl Checker<'_> {
    fn decl(&self, id: DeclId) -> Result<(), String> {
        if id.index() < self.design.decls.len() {
            Ok(())
        } else {
            Err(format!("declaration id {} out of range", id.0))
        }
    }

    fn scope(&self, id: ScopeId) -> Result<(), String> {
        if id.index() < self.design.scopes.len() {
            Ok(())
        } else {
            Err(format!("scope id {} out of range", id.0))
        }
    }

    fn definition(&self, id: DeclId) -> Result<(), String> {
        self.decl(id)?;
        match self.design.decl(id).kind {
            DeclKind::Definition { .. } => Ok(()),
            _ => Err(format!("declaration {} is not a definition", id.0)),
        }
    }

    fn ty(&self, ty: &DataType) -> Result<(), String> {
        match ty {
            DataType::Named { decl, resolved } => {
                self.decl(*decl)?;
                self.ty(resolved)
            }
            DataType::Container { element, .. } => self.ty(element),
            DataType::VirtualInterface { definition, .. } | DataType::Interface { definition, .. } => {
                self.definition(*definition)
            }
            DataType::Class(id) | DataType::Covergroup(id) => self.scope(*id),
            DataType::Scalar | DataType::String | DataType::Event => Ok(()),
        }
    }

    fn expr(&self, expr: &Expr) -> Result<(), String> {
        let mut result = Ok(());
        expr.walk(&mut |e| {
            if result.is_err() {
                return;
            }
            result = match e {
                Expr::Name(id) | Expr::Hierarchical { target: id, .. } => self.decl(*id),
                Expr::Instance(id) => self.scope(*id),
                Expr::Call {
                    target: CallTarget::Subroutine(id),
                    ..
                } => self.scope(*id),
                Expr::MethodCall {
                    target: Some(id), ..
                } => self.scope(*id),
                Expr::New { class: Some(id), .. } => self.scope(*id),
                Expr::EnumValue { typedef: Some(id) } => self.decl(*id),
                Expr::ScopedName { prefix, target } => {
                    self.ty(prefix).and_then(|_| self.decl(*target))
                }
                Expr::Cast { ty, .. } | Expr::TypeOperand(ty) => self.ty(ty),
                _ => Ok(()),
            };
        });
        result
    }

    fn stmt(&self, stmt: &Stmt) -> Result<(), String> {
        for id in stmt.local_decls() {
            self.decl(*id)?;
        }
        let (exprs, stmts) = stmt.parts();
        for e in exprs {
            self.expr(e)?;
        }
        for s in stmts {
            self.stmt(s)?;
        }
        Ok(())
    }

    fn decl_shape(&self, decl: &Declaration) -> Result<(), String> {
        if let Container::Definition(def) = decl.container {
            self.definition(def)?;
        }
        self.ty(&decl.ty)?;
        for dim in &decl.dims {
            self.expr(dim)?;
        }
        if let Some(init) = &decl.initializer {
            self.expr(init)?;
        }
        match &decl.kind {
            DeclKind::Port {
                expression: Some(e),
                ..
            } => self.expr(e),
            DeclKind::ClockVar { target, .. } | DeclKind::ModportPort { target, .. } => {
                self.expr(target)
            }
            _ => Ok(()),
        }
    }

    fn scope_shape(&self, scope: &ScopeNode) -> Result<(), String> {
        match scope.kind {
            ScopeKind::Class { base: Some(base) } => self.scope(base)?,
            ScopeKind::Instance { definition } => self.definition(definition)?,
            _ => {}
        }
        for member in &scope.members {
            match member {
                Member::Decl(id) => self.decl(*id)?,
                Member::Instance(inst) => {
                    self.scope(inst.body)?;
                    if self.design.scope(inst.body).definition().is_none() {
                        return Err(format!("instance body {} is not an instance scope", inst.body.0));
                    }
                    for conn in &inst.connections {
                        self.decl(conn.port)?;
                        if let Some(actual) = &conn.actual {
                            self.expr(actual)?;
                        }
                    }
                    for param in &inst.parameters {
                        self.expr(param)?;
                    }
                }
                Member::Generate {
                    condition,
                    branches,
                } => {
                    if let Some(cond) = condition {
                        self.expr(cond)?;
                    }
                    for branch in branches {
                        self.scope(*branch)?;
                    }
                }
                Member::Scope(id) => self.scope(*id)?,
                Member::ContinuousAssign { lhs, rhs } => {
                    self.expr(lhs)?;
                    self.expr(rhs)?;
                }
                Member::Procedure { body, .. } => self.stmt(body)?,
                Member::Observe(e) => self.expr(e)?,
            }
        }
        Ok(())
    }
}

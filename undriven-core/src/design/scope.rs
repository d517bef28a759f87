//! Nodes of the elaborated instance tree.

use serde::{Deserialize, Serialize};

use super::expr::{Expr, Stmt};
use super::{DeclId, ScopeId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    CompilationUnit,
    Package,
    Class {
        #[serde(default)]
        base: Option<ScopeId>,
    },
    /// Body of one instance of `definition`
    Instance { definition: DeclId },
    /// Generate block chosen by elaboration
    Generate,
    Subroutine,
    ClockingBlock,
    Modport,
    Covergroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    Initial,
    Final,
    Always,
    AlwaysComb,
    AlwaysFf,
    AlwaysLatch,
    /// Body of a function or task
    Subroutine,
}

/// One port binding of an instantiation, `.port(actual)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConnection {
    pub port: DeclId,
    #[serde(default)]
    pub actual: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub body: ScopeId,
    #[serde(default)]
    pub connections: Vec<PortConnection>,
    /// Parameter override expressions, evaluated in the instantiating scope
    #[serde(default)]
    pub parameters: Vec<Expr>,
}

/// Closed set of scope members, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Member {
    Decl(DeclId),
    Instance(Instance),
    /// Conditional or looped generate construct. `branches` holds only the
    /// blocks elaboration actually instantiated.
    Generate {
        #[serde(default)]
        condition: Option<Expr>,
        #[serde(default)]
        branches: Vec<ScopeId>,
    },
    /// Nested subroutine, class, clocking block, modport or covergroup
    Scope(ScopeId),
    ContinuousAssign { lhs: Expr, rhs: Expr },
    Procedure { kind: ProcedureKind, body: Stmt },
    /// Expression sampled by a declarative construct: clocking event,
    /// coverpoint, concurrent assertion
    Observe(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeNode {
    pub name: String,
    pub kind: ScopeKind,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl ScopeNode {
    pub fn new(name: impl Into<String>, kind: ScopeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            members: Vec::new(),
        }
    }

    /// Definition this scope instantiates, for instance bodies.
    pub fn definition(&self) -> Option<DeclId> {
        match self.kind {
            ScopeKind::Instance { definition } => Some(definition),
            _ => None,
        }
    }

    /// Declarations listed directly in this scope.
    pub fn decls(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.members.iter().filter_map(|m| match m {
            Member::Decl(id) => Some(*id),
            _ => None,
        })
    }
}

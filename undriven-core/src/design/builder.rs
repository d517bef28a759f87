//! Programmatic construction of elaborated designs.
//!
//! Front ends other than the JSON loader, and the test suites, assemble
//! designs through this builder. Arena ids are handed out in creation order.

use super::{
    Container, DeclId, DeclKind, Declaration, DefinitionKind, Design, Expr, Instance, Member,
    PortConnection, ScopeId, ScopeKind, ScopeNode, SourceLocation,
};
use crate::error::UndrivenResult;

/// Fluent builder for [`Design`].
///
/// # Example
///
/// ```rust,ignore
/// let mut b = DesignBuilder::new();
/// let m = b.definition("m", DefinitionKind::Module, SourceLocation::new("m.sv", 1, 8));
/// b.top(m);
/// let body = b.instance_body(m, "m");
/// b.root(body);
/// let design = b.build()?;
/// ```
#[derive(Debug, Default)]
pub struct DesignBuilder {
    design: Design,
}

impl DesignBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declaration to the arena without placing it in any scope.
    pub fn declare(&mut self, decl: Declaration) -> DeclId {
        let id = DeclId(self.design.decls.len() as u32);
        self.design.decls.push(decl);
        id
    }

    /// Adds a scope to the arena without attaching it to a parent.
    pub fn scope(&mut self, name: impl Into<String>, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.design.scopes.len() as u32);
        self.design.scopes.push(ScopeNode::new(name, kind));
        id
    }

    /// Registers a module, interface or program definition.
    pub fn definition(
        &mut self,
        name: impl Into<String>,
        kind: DefinitionKind,
        location: SourceLocation,
    ) -> DeclId {
        let id = self.declare(
            Declaration::new(name, DeclKind::Definition { kind }, Container::CompilationUnit)
                .with_location(location),
        );
        self.design.definitions.push(id);
        id
    }

    pub fn top(&mut self, def: DeclId) -> &mut Self {
        self.design.tops.push(def);
        self
    }

    pub fn root(&mut self, scope: ScopeId) -> &mut Self {
        self.design.roots.push(scope);
        self
    }

    pub fn push(&mut self, scope: ScopeId, member: Member) -> &mut Self {
        self.design.scopes[scope.index()].members.push(member);
        self
    }

    /// Declares `decl` and lists it as a member of `scope`.
    pub fn add_decl(&mut self, scope: ScopeId, decl: Declaration) -> DeclId {
        let id = self.declare(decl);
        self.push(scope, Member::Decl(id));
        id
    }

    /// Creates a named child scope of `parent`.
    pub fn nested(&mut self, parent: ScopeId, name: impl Into<String>, kind: ScopeKind) -> ScopeId {
        let id = self.scope(name, kind);
        self.push(parent, Member::Scope(id));
        id
    }

    /// Creates an unattached instance body of `def`, for top-level roots.
    pub fn instance_body(&mut self, def: DeclId, name: impl Into<String>) -> ScopeId {
        self.scope(name, ScopeKind::Instance { definition: def })
    }

    /// Instantiates `def` inside `parent` and returns the new instance body.
    pub fn instantiate(
        &mut self,
        parent: ScopeId,
        def: DeclId,
        name: impl Into<String>,
        connections: Vec<PortConnection>,
        parameters: Vec<Expr>,
    ) -> ScopeId {
        let body = self.instance_body(def, name);
        self.push(
            parent,
            Member::Instance(Instance {
                body,
                connections,
                parameters,
            }),
        );
        body
    }

    /// Adds a generate construct to `parent`; `branches` are the blocks
    /// elaboration instantiated.
    pub fn generate(&mut self, parent: ScopeId, condition: Option<Expr>, branches: Vec<ScopeId>) -> &mut Self {
        self.push(
            parent,
            Member::Generate {
                condition,
                branches,
            },
        )
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.design.decls[id.index()]
    }

    /// Validates ids and returns the finished design.
    pub fn build(self) -> UndrivenResult<Design> {
        self.design.validate()?;
        Ok(self.design)
    }
}

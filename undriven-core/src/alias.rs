//! Alias resolution for handles and views.
//!
//! Virtual interfaces, interface ports and class handles do not hold storage;
//! they denote other scopes. The resolver keeps, per handle declaration, the
//! union of every source statically assigned to it so far in the pass
//! (forward, flow-insensitive, no fixed point). A handle never assigned falls
//! back to its static type. A handle fed from a call result is marked unknown:
//! accesses through it are not attributed to any declaration.
//!
//! ```text
//!   vif = top.bus_inst;      bind(vif, {s_bus})
//!   h   = new;               bind(h,   {class C})
//!   g   = get_handle();      bind(g,   unknown)
//!
//!   vif.cb.data   resolve(vif) = {s_bus}
//!                 lookup(s_bus, "cb")   -> Scope(s_cb)
//!                 lookup(s_cb, "data")  -> Decl(clockvar) -> underlying signal
//! ```

use std::collections::HashMap;

use crate::design::{DataType, DeclId, Design, Expr, Member, ScopeId, ScopeKind};

/// Alias chains longer than this are treated as cycles.
pub(crate) const MAX_ALIAS_DEPTH: usize = 32;

/// What a member name denotes inside a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place {
    Decl(DeclId),
    Scope(ScopeId),
}

/// Name lookup table over the elaborated tree, built once per design.
///
/// Shared read-only by every traversal worker.
#[derive(Debug, Default)]
pub struct MemberIndex {
    members: HashMap<ScopeId, HashMap<String, Place>>,
    representatives: HashMap<DeclId, ScopeId>,
}

impl MemberIndex {
    pub fn build(design: &Design) -> Self {
        let mut index = Self::default();

        for (i, scope) in design.scopes.iter().enumerate() {
            let id = ScopeId(i as u32);
            if let Some(def) = scope.definition() {
                index.representatives.entry(def).or_insert(id);
            }

            let names = index.members.entry(id).or_default();
            for member in &scope.members {
                match member {
                    Member::Decl(d) => {
                        names
                            .entry(design.decl(*d).name.clone())
                            .or_insert(Place::Decl(*d));
                    }
                    Member::Instance(inst) => {
                        names
                            .entry(design.scope(inst.body).name.clone())
                            .or_insert(Place::Scope(inst.body));
                    }
                    Member::Generate { branches, .. } => {
                        for b in branches {
                            names
                                .entry(design.scope(*b).name.clone())
                                .or_insert(Place::Scope(*b));
                        }
                    }
                    Member::Scope(s) => {
                        names
                            .entry(design.scope(*s).name.clone())
                            .or_insert(Place::Scope(*s));
                    }
                    _ => {}
                }
            }
        }

        index
    }

    /// Looks `name` up in `scope`, then along the class base chain.
    pub fn lookup(&self, design: &Design, scope: ScopeId, name: &str) -> Option<Place> {
        let mut current = scope;
        for _ in 0..=design.scopes.len() {
            if let Some(place) = self.members.get(&current).and_then(|m| m.get(name)) {
                return Some(*place);
            }
            match design.scope(current).kind {
                ScopeKind::Class { base: Some(base) } => current = base,
                _ => return None,
            }
        }
        None
    }

    /// First elaborated instance body of `def`.
    pub fn representative(&self, def: DeclId) -> Option<ScopeId> {
        self.representatives.get(&def).copied()
    }

    /// Narrows an interface instance to one of its modports.
    pub fn view(&self, design: &Design, scope: ScopeId, modport: Option<&str>) -> ScopeId {
        let Some(name) = modport else {
            return scope;
        };
        if !matches!(design.scope(scope).kind, ScopeKind::Instance { .. }) {
            return scope;
        }
        match self.lookup(design, scope, name) {
            Some(Place::Scope(mp)) if design.scope(mp).kind == ScopeKind::Modport => mp,
            _ => scope,
        }
    }
}

/// Sources observed for one handle declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasSet {
    pub targets: Vec<ScopeId>,
    /// Assigned from something the analysis cannot see through
    pub unknown: bool,
}

impl AliasSet {
    pub fn unknown() -> Self {
        Self {
            targets: Vec::new(),
            unknown: true,
        }
    }

    pub fn union(&mut self, other: &AliasSet) {
        for t in &other.targets {
            if !self.targets.contains(t) {
                self.targets.push(*t);
            }
        }
        self.unknown |= other.unknown;
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && !self.unknown
    }
}

/// Scopes an indirection expression may denote at one occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub scopes: Vec<ScopeId>,
    pub unresolved: bool,
}

impl Resolution {
    fn of(scope: ScopeId) -> Self {
        Self {
            scopes: vec![scope],
            unresolved: false,
        }
    }

    fn unresolved() -> Self {
        Self {
            scopes: Vec::new(),
            unresolved: true,
        }
    }

    fn absorb(&mut self, other: Resolution) {
        for s in other.scopes {
            if !self.scopes.contains(&s) {
                self.scopes.push(s);
            }
        }
        self.unresolved |= other.unresolved;
    }
}

/// Per-run alias map from handle declarations to their observed sources.
pub struct AliasResolver<'d> {
    design: &'d Design,
    index: &'d MemberIndex,
    sets: HashMap<DeclId, AliasSet>,
}

impl<'d> AliasResolver<'d> {
    pub fn new(design: &'d Design, index: &'d MemberIndex) -> Self {
        Self {
            design,
            index,
            sets: HashMap::new(),
        }
    }

    pub fn index(&self) -> &'d MemberIndex {
        self.index
    }

    pub fn set_of(&self, handle: DeclId) -> Option<&AliasSet> {
        self.sets.get(&handle)
    }

    /// Adds `sources` to the handle's set.
    pub fn bind(&mut self, handle: DeclId, sources: AliasSet) {
        self.sets.entry(handle).or_default().union(&sources);
    }

    /// Records the assignment `lhs = rhs` for every handle `lhs` denotes.
    pub fn assign(&mut self, lhs: &Expr, rhs: &Expr) {
        let design = self.design;
        let updates: Vec<(DeclId, AliasSet)> = self
            .handle_decls(lhs)
            .into_iter()
            .map(|h| (h, self.sources_of(rhs, &design.decl(h).ty)))
            .collect();
        for (h, sources) in updates {
            tracing::trace!(handle = %h, targets = sources.targets.len(), unknown = sources.unknown, "alias bind");
            self.bind(h, sources);
        }
    }

    /// Sources contributed by `rhs` when assigned to a handle of type `target_ty`.
    pub fn sources_of(&self, rhs: &Expr, target_ty: &DataType) -> AliasSet {
        match rhs {
            Expr::Null | Expr::Literal => AliasSet::default(),
            Expr::New { class, .. } => {
                let class = class.or(match target_ty.canonical() {
                    DataType::Class(s) | DataType::Covergroup(s) => Some(*s),
                    _ => None,
                });
                AliasSet {
                    targets: class.into_iter().collect(),
                    unknown: false,
                }
            }
            Expr::Conditional { left, right, .. } => {
                let mut set = self.sources_of(left, target_ty);
                set.union(&self.sources_of(right, target_ty));
                set
            }
            _ => {
                let res = self.resolve(rhs);
                let modport = target_ty.modport();
                let mut targets = Vec::new();
                for s in res.scopes {
                    let v = self.index.view(self.design, s, modport);
                    if !targets.contains(&v) {
                        targets.push(v);
                    }
                }
                AliasSet {
                    targets,
                    unknown: res.unresolved,
                }
            }
        }
    }

    /// Scopes denoted by an indirection expression.
    pub fn resolve(&self, expr: &Expr) -> Resolution {
        self.resolve_at(expr, 0)
    }

    fn resolve_at(&self, expr: &Expr, depth: usize) -> Resolution {
        if depth > MAX_ALIAS_DEPTH {
            return Resolution::unresolved();
        }
        match expr {
            Expr::Instance(s) => Resolution::of(*s),
            Expr::Name(d) | Expr::Hierarchical { target: d, .. } => self.resolve_decl(*d, depth),
            Expr::Member { base, member } => {
                let inner = self.resolve_at(base, depth + 1);
                let mut out = Resolution {
                    scopes: Vec::new(),
                    unresolved: inner.unresolved,
                };
                for s in inner.scopes {
                    match self.index.lookup(self.design, s, member) {
                        Some(Place::Scope(child)) => out.absorb(Resolution::of(child)),
                        Some(Place::Decl(d)) => out.absorb(self.resolve_decl(d, depth + 1)),
                        None => {}
                    }
                }
                out
            }
            Expr::Select { base, .. } | Expr::Cast { operand: base, .. } => {
                self.resolve_at(base, depth + 1)
            }
            Expr::Conditional { left, right, .. } => {
                let mut out = self.resolve_at(left, depth + 1);
                out.absorb(self.resolve_at(right, depth + 1));
                out
            }
            Expr::Call { .. } | Expr::MethodCall { .. } => Resolution::unresolved(),
            _ => Resolution::default(),
        }
    }

    fn resolve_decl(&self, id: DeclId, depth: usize) -> Resolution {
        let decl = self.design.decl(id);
        if let Some(target) = decl.kind.alias_target() {
            return self.resolve_at(target, depth + 1);
        }
        if !decl.is_handle() {
            return Resolution::default();
        }
        let mut res = match self.sets.get(&id) {
            Some(set) => Resolution {
                scopes: set.targets.clone(),
                unresolved: set.unknown,
            },
            None => Resolution::default(),
        };
        if res.scopes.is_empty() {
            res.scopes = self.static_scopes(&decl.ty);
        }
        res
    }

    /// Scopes implied by a handle's declared type alone.
    pub fn static_scopes(&self, ty: &DataType) -> Vec<ScopeId> {
        match ty.canonical() {
            DataType::Class(s) | DataType::Covergroup(s) => vec![*s],
            DataType::VirtualInterface { definition, modport }
            | DataType::Interface { definition, modport } => self
                .index
                .representative(*definition)
                .map(|s| self.index.view(self.design, s, modport.as_deref()))
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether `expr` goes through a handle, an instance or a named scope.
    pub fn is_indirection(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Instance(_) => true,
            Expr::Name(d) | Expr::Hierarchical { target: d, .. } => self.design.decl(*d).is_handle(),
            Expr::Member { base, member } => {
                self.is_indirection(base)
                    && self.resolve(base).scopes.iter().any(|s| {
                        match self.index.lookup(self.design, *s, member) {
                            Some(Place::Scope(_)) => true,
                            Some(Place::Decl(d)) => self.design.decl(d).is_handle(),
                            None => false,
                        }
                    })
            }
            Expr::Select { base, .. } | Expr::Cast { operand: base, .. } => self.is_indirection(base),
            Expr::Conditional { left, right, .. } => {
                self.is_indirection(left) || self.is_indirection(right)
            }
            _ => false,
        }
    }

    /// Handle declarations an assignment target denotes.
    pub fn handle_decls(&self, lhs: &Expr) -> Vec<DeclId> {
        match lhs {
            Expr::Name(d) | Expr::Hierarchical { target: d, .. } => {
                if self.design.decl(*d).is_handle() {
                    vec![*d]
                } else {
                    Vec::new()
                }
            }
            Expr::Select { base, .. } => self.handle_decls(base),
            Expr::Member { base, member } => {
                let mut out = Vec::new();
                for s in self.resolve(base).scopes {
                    if let Some(Place::Decl(d)) = self.index.lookup(self.design, s, member) {
                        if self.design.decl(d).is_handle() && !out.contains(&d) {
                            out.push(d);
                        }
                    }
                }
                out
            }
            Expr::Concat(items) => items.iter().flat_map(|i| self.handle_decls(i)).collect(),
            _ => Vec::new(),
        }
    }

    /// Storage behind a declaration: itself, or an alias declaration's target.
    pub fn underlying(&self, id: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        self.denoted_decl(id, 0, &mut out);
        out
    }

    fn denoted_into(&self, expr: &Expr, depth: usize, out: &mut Vec<DeclId>) {
        if depth > MAX_ALIAS_DEPTH {
            return;
        }
        match expr {
            Expr::Name(d) | Expr::Hierarchical { target: d, .. } => self.denoted_decl(*d, depth, out),
            Expr::Select { base, .. } | Expr::Cast { operand: base, .. } => {
                self.denoted_into(base, depth + 1, out)
            }
            Expr::Member { base, member } => {
                if self.is_indirection(base) {
                    for s in self.resolve(base).scopes {
                        if let Some(Place::Decl(d)) = self.index.lookup(self.design, s, member) {
                            self.denoted_decl(d, depth + 1, out);
                        }
                    }
                } else {
                    self.denoted_into(base, depth + 1, out);
                }
            }
            Expr::Concat(items) => {
                for item in items {
                    self.denoted_into(item, depth + 1, out);
                }
            }
            _ => {}
        }
    }

    fn denoted_decl(&self, id: DeclId, depth: usize, out: &mut Vec<DeclId>) {
        match self.design.decl(id).kind.alias_target() {
            Some(target) => self.denoted_into(target, depth + 1, out),
            None => {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::*;

    struct Fixture {
        design: Design,
        bus_inst: ScopeId,
        mp: ScopeId,
        sig: DeclId,
        vif: DeclId,
        vif_mp: DeclId,
        class: ScopeId,
        handle: DeclId,
    }

    fn fixture() -> Fixture {
        let mut b = DesignBuilder::new();
        let bus = b.definition("bus", DefinitionKind::Interface, SourceLocation::new("t.sv", 1, 11));
        let top = b.definition("top", DefinitionKind::Module, SourceLocation::new("t.sv", 10, 8));
        b.top(top);

        let cu = b.scope("$unit", ScopeKind::CompilationUnit);
        b.root(cu);
        let class = b.nested(cu, "C", ScopeKind::Class { base: None });

        let top_body = b.instance_body(top, "top");
        b.root(top_body);
        let bus_inst = b.instantiate(top_body, bus, "u_bus", vec![], vec![]);
        let sig = b.add_decl(
            bus_inst,
            Declaration::new("sig", DeclKind::Variable, Container::Definition(bus)),
        );
        let mp = b.nested(bus_inst, "mon", ScopeKind::Modport);
        b.add_decl(
            mp,
            Declaration::new(
                "sig",
                DeclKind::ModportPort {
                    direction: Direction::In,
                    target: Expr::Name(sig),
                },
                Container::Definition(bus),
            ),
        );

        let vif = b.add_decl(
            top_body,
            Declaration::new("vif", DeclKind::Variable, Container::Definition(top)).with_type(
                DataType::VirtualInterface {
                    definition: bus,
                    modport: None,
                },
            ),
        );
        let vif_mp = b.add_decl(
            top_body,
            Declaration::new("vif_mp", DeclKind::Variable, Container::Definition(top)).with_type(
                DataType::VirtualInterface {
                    definition: bus,
                    modport: Some("mon".into()),
                },
            ),
        );
        let handle = b.add_decl(
            top_body,
            Declaration::new("h", DeclKind::Variable, Container::Definition(top))
                .with_type(DataType::Class(class)),
        );

        Fixture {
            design: b.build().unwrap(),
            bus_inst,
            mp,
            sig,
            vif,
            vif_mp,
            class,
            handle,
        }
    }

    #[test]
    fn test_unassigned_handle_uses_static_type() {
        let f = fixture();
        let index = MemberIndex::build(&f.design);
        let resolver = AliasResolver::new(&f.design, &index);
        assert_eq!(resolver.resolve(&Expr::Name(f.vif)).scopes, vec![f.bus_inst]);
        assert_eq!(resolver.resolve(&Expr::Name(f.vif_mp)).scopes, vec![f.mp]);
        assert_eq!(resolver.resolve(&Expr::Name(f.handle)).scopes, vec![f.class]);
    }

    #[test]
    fn test_instance_assignment_binds_modport_view() {
        let f = fixture();
        let index = MemberIndex::build(&f.design);
        let mut resolver = AliasResolver::new(&f.design, &index);
        resolver.assign(&Expr::Name(f.vif_mp), &Expr::Instance(f.bus_inst));
        assert_eq!(resolver.set_of(f.vif_mp).unwrap().targets, vec![f.mp]);
    }

    #[test]
    fn test_call_result_is_unknown() {
        let f = fixture();
        let index = MemberIndex::build(&f.design);
        let mut resolver = AliasResolver::new(&f.design, &index);
        resolver.assign(&Expr::Name(f.vif), &Expr::system("$get_vif", vec![]));
        let res = resolver.resolve(&Expr::Name(f.vif));
        assert!(res.unresolved);
        // static type still names the members that would be reached
        assert_eq!(res.scopes, vec![f.bus_inst]);
    }

    #[test]
    fn test_handle_copy_unions_sources() {
        let f = fixture();
        let index = MemberIndex::build(&f.design);
        let mut resolver = AliasResolver::new(&f.design, &index);
        resolver.assign(&Expr::Name(f.vif), &Expr::Instance(f.bus_inst));
        resolver.assign(&Expr::Name(f.vif), &Expr::Null);
        assert_eq!(resolver.set_of(f.vif).unwrap().targets, vec![f.bus_inst]);
        assert!(!resolver.set_of(f.vif).unwrap().unknown);
    }

    #[test]
    fn test_underlying_follows_modport_port() {
        let f = fixture();
        let index = MemberIndex::build(&f.design);
        let resolver = AliasResolver::new(&f.design, &index);
        assert!(resolver.is_indirection(&Expr::Name(f.vif_mp)));
        let Some(Place::Decl(port)) = index.lookup(&f.design, f.mp, "sig") else {
            panic!("modport port not indexed");
        };
        assert_eq!(resolver.underlying(port), vec![f.sig]);
        assert_eq!(resolver.underlying(f.sig), vec![f.sig]);
    }

    #[test]
    fn test_lookup_walks_class_base() {
        let mut b = DesignBuilder::new();
        let cu = b.scope("$unit", ScopeKind::CompilationUnit);
        b.root(cu);
        let base = b.nested(cu, "Base", ScopeKind::Class { base: None });
        let field = b.add_decl(base, Declaration::new("x", DeclKind::Variable, Container::Class));
        let derived = b.nested(cu, "Derived", ScopeKind::Class { base: Some(base) });
        let design = b.build().unwrap();
        let index = MemberIndex::build(&design);
        assert_eq!(index.lookup(&design, derived, "x"), Some(Place::Decl(field)));
        assert_eq!(index.lookup(&design, derived, "y"), None);
    }
}

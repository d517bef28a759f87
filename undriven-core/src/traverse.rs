//! Traversal engine.
//!
//! Walks the elaborated instance tree depth-first in declaration order and
//! feeds every statement and expression through the classifier. The
//! [`AnalysisContext`] owns all per-run mutable state: the usage table, the
//! alias resolver and the cancellation flag. Nothing global.
//!
//! Only generate blocks elaboration instantiated appear in the tree, so
//! untaken branches contribute nothing.
//!
//! In parallel mode roots are split into groups whose instance trees share no
//! definition. Each group gets its own context (its own usage shard and alias
//! map) on the rayon pool and walks its roots in order; shards are merged by
//! summing counters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::alias::{AliasResolver, MemberIndex};
use crate::classify::{Access, AccessKind, Classification, Classifier, Role};
use crate::design::{
    DeclId, DeclKind, Design, Direction, Expr, Member, ScopeId, ScopeKind, Stmt, Timing,
};
#[cfg(feature = "parallel")]
use crate::hierarchy::{build_hierarchy, reachable_definitions};
use crate::usage::UsageTable;

/// Counters gathered while walking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TraversalStats {
    pub scopes: usize,
    pub statements: usize,
    pub accesses: usize,
    pub unresolved: usize,
}

impl TraversalStats {
    fn add(&mut self, other: &TraversalStats) {
        self.scopes += other.scopes;
        self.statements += other.statements;
        self.accesses += other.accesses;
        self.unresolved += other.unresolved;
    }
}

/// Usage gathered by a finished (or aborted) traversal.
#[derive(Debug, Clone)]
pub struct TraversalOutcome {
    pub usage: UsageTable,
    /// False when the run was cancelled before every scope was visited
    pub complete: bool,
    pub stats: TraversalStats,
}

/// Mutable state of one traversal.
pub struct AnalysisContext<'d> {
    design: &'d Design,
    usage: UsageTable,
    resolver: AliasResolver<'d>,
    cancel: Arc<AtomicBool>,
    visited: Vec<bool>,
    aborted: bool,
    stats: TraversalStats,
}

impl<'d> AnalysisContext<'d> {
    pub fn new(design: &'d Design, index: &'d MemberIndex, cancel: Arc<AtomicBool>) -> Self {
        Self {
            design,
            usage: UsageTable::new(design.decls.len()),
            resolver: AliasResolver::new(design, index),
            cancel,
            visited: vec![false; design.scopes.len()],
            aborted: false,
            stats: TraversalStats::default(),
        }
    }

    /// Registers every definition so they are decided even when nothing
    /// elaborated them.
    pub fn register_definitions(&mut self) {
        for def in &self.design.definitions {
            self.usage.register(*def);
        }
    }

    pub fn traverse_root(&mut self, root: ScopeId) {
        let _span = tracing::debug_span!("root", scope = %self.design.scope(root).name).entered();
        self.scope(root);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn usage(&self) -> &UsageTable {
        &self.usage
    }

    pub fn resolver(&self) -> &AliasResolver<'d> {
        &self.resolver
    }

    pub fn finish(self) -> TraversalOutcome {
        TraversalOutcome {
            usage: self.usage,
            complete: !self.aborted,
            stats: self.stats,
        }
    }

    fn scope(&mut self, id: ScopeId) {
        if self.aborted || self.visited[id.index()] {
            return;
        }
        if self.cancel.load(Ordering::Relaxed) {
            tracing::info!(scope = %id, "traversal cancelled");
            self.aborted = true;
            return;
        }
        self.visited[id.index()] = true;
        self.stats.scopes += 1;

        let design = self.design;
        let scope = design.scope(id);
        tracing::debug!(scope = %scope.name, kind = ?scope.kind, members = scope.members.len(), "visit scope");

        for member in &scope.members {
            self.member(member);
        }

        if !self.aborted && scope.kind == ScopeKind::Subroutine {
            for decl in scope.decls() {
                self.usage.mark_completed(decl);
            }
        }
    }

    fn member(&mut self, member: &'d Member) {
        let design = self.design;
        match member {
            Member::Decl(id) => self.declaration(*id),
            Member::Instance(inst) => {
                for param in &inst.parameters {
                    self.expr(param, Role::Read);
                }
                for conn in &inst.connections {
                    let Some(actual) = &conn.actual else {
                        continue;
                    };
                    let port = design.decl(conn.port);
                    if port.is_handle() {
                        let sources = self.resolver.sources_of(actual, &port.ty);
                        self.resolver.bind(conn.port, sources);
                        self.expr(actual, Role::Read);
                    } else {
                        let dir = port.kind.direction().unwrap_or(Direction::In);
                        self.expr(actual, Role::Argument(dir));
                    }
                }
                if let Some(def) = design.scope(inst.body).definition() {
                    self.apply(Access::Use {
                        decl: def,
                        kind: AccessKind::Construct,
                        partial: false,
                    });
                }
                self.scope(inst.body);
            }
            Member::Generate {
                condition,
                branches,
            } => {
                if let Some(cond) = condition {
                    self.expr(cond, Role::Read);
                }
                for branch in branches {
                    self.scope(*branch);
                }
            }
            Member::Scope(id) => self.scope(*id),
            Member::ContinuousAssign { lhs, rhs } => self.assignment(lhs, rhs, None),
            Member::Procedure { body, .. } => self.stmt(body),
            Member::Observe(expr) => self.expr(expr, Role::Read),
        }
    }

    /// Registers a declaration and records the uses its own declaration
    /// performs: type references, dimensions, initializer.
    fn declaration(&mut self, id: DeclId) {
        self.usage.register(id);
        let design = self.design;
        let decl = design.decl(id);

        let type_uses = Classifier::new(design, &self.resolver).classify_type(&decl.ty);
        for access in type_uses {
            self.apply(access);
        }
        for dim in &decl.dims {
            self.expr(dim, Role::Read);
        }

        if let Some(init) = &decl.initializer {
            // an initializer reads its operands but is not a write
            self.expr(init, Role::Read);
            if init.is_new() {
                self.usage.mark_constructed(id);
            }
            if decl.is_handle() {
                let sources = self.resolver.sources_of(init, &decl.ty);
                self.resolver.bind(id, sources);
            }
        }

        match &decl.kind {
            DeclKind::Port {
                direction,
                expression: Some(e),
            } => self.expr(e, Role::port_internal(*direction)),
            DeclKind::ModportPort { direction, target } => {
                self.expr(target, Role::Argument(*direction))
            }
            _ => {}
        }
    }

    fn stmt(&mut self, stmt: &'d Stmt) {
        self.stats.statements += 1;
        match stmt {
            Stmt::Empty => {}
            Stmt::Expr(e) | Stmt::Return(Some(e)) => self.expr(e, Role::Read),
            Stmt::Return(None) => {}
            Stmt::Block { locals, body } => {
                for local in locals {
                    self.declaration(*local);
                }
                for s in body {
                    self.stmt(s);
                }
                self.complete_locals(locals);
            }
            Stmt::Assign { lhs, rhs, timing } => self.assignment(lhs, rhs, timing.as_ref()),
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond, Role::Read);
                self.stmt(then);
                if let Some(other) = otherwise {
                    self.stmt(other);
                }
            }
            Stmt::Case {
                subject,
                items,
                default,
            } => {
                self.expr(subject, Role::Read);
                for item in items {
                    for label in &item.labels {
                        self.expr(label, Role::Read);
                    }
                    self.stmt(&item.body);
                }
                if let Some(d) = default {
                    self.stmt(d);
                }
            }
            Stmt::Loop { cond, body, .. } => {
                if let Some(c) = cond {
                    self.expr(c, Role::Read);
                }
                self.stmt(body);
            }
            Stmt::For {
                locals,
                cond,
                steps,
                body,
            } => {
                for local in locals {
                    self.declaration(*local);
                }
                if let Some(c) = cond {
                    self.expr(c, Role::Read);
                }
                for step in steps {
                    self.expr(step, Role::Read);
                }
                self.stmt(body);
                self.complete_locals(locals);
            }
            Stmt::Foreach {
                array,
                loop_vars,
                body,
            } => {
                self.expr(array, Role::Read);
                for var in loop_vars {
                    self.declaration(*var);
                    self.apply(Access::Use {
                        decl: *var,
                        kind: AccessKind::Write,
                        partial: false,
                    });
                }
                self.stmt(body);
                self.complete_locals(loop_vars);
            }
            Stmt::Timed { timing, body } => {
                self.timing(timing);
                self.stmt(body);
            }
            Stmt::Wait { cond, body } => {
                self.expr(cond, Role::Read);
                self.stmt(body);
            }
            Stmt::Trigger(e) => self.expr(e, Role::EventTrigger),
            Stmt::Assert { cond, action } => {
                self.expr(cond, Role::Read);
                if let Some(a) = action {
                    self.stmt(a);
                }
            }
        }
    }

    fn assignment(&mut self, lhs: &'d Expr, rhs: &'d Expr, timing: Option<&'d Timing>) {
        self.expr(rhs, Role::Read);
        if let Some(t) = timing {
            self.timing(t);
        }
        self.expr(lhs, Role::assignment_target(rhs));
        self.resolver.assign(lhs, rhs);
    }

    fn timing(&mut self, timing: &'d Timing) {
        match timing {
            Timing::Delay(e) | Timing::Cycles(e) => self.expr(e, Role::Read),
            Timing::Event(events) => {
                for ev in events {
                    self.expr(&ev.expr, Role::EventWait);
                    if let Some(iff) = &ev.iff {
                        self.expr(iff, Role::Read);
                    }
                }
            }
        }
    }

    fn expr(&mut self, expr: &'d Expr, role: Role) {
        let classified = Classifier::new(self.design, &self.resolver).classify(expr, role);
        self.record(classified);
    }

    fn record(&mut self, classified: Classification<'d>) {
        for access in classified.accesses {
            self.apply(access);
        }
        for (lhs, rhs) in classified.bindings {
            self.resolver.assign(lhs, rhs);
        }
    }

    fn apply(&mut self, access: Access) {
        match access {
            Access::Use {
                decl,
                kind,
                partial,
            } => {
                self.stats.accesses += 1;
                match kind {
                    AccessKind::Read => self.usage.add_read(decl, partial),
                    AccessKind::Write => self.usage.add_write(decl, partial),
                    AccessKind::ReadWrite => {
                        self.usage.add_read(decl, partial);
                        self.usage.add_write(decl, partial);
                    }
                    AccessKind::Construct => {
                        self.usage.mark_constructed(decl);
                        self.usage.add_write(decl, false);
                    }
                }
            }
            Access::Unresolved(decl) => {
                self.stats.unresolved += 1;
                self.usage.mark_unresolved(decl);
            }
        }
    }

    fn complete_locals(&mut self, locals: &[DeclId]) {
        if self.aborted {
            return;
        }
        for local in locals {
            self.usage.mark_completed(*local);
        }
    }
}

/// Walks every root in order with a single context.
pub fn traverse(design: &Design, index: &MemberIndex, cancel: &Arc<AtomicBool>) -> TraversalOutcome {
    let mut ctx = AnalysisContext::new(design, index, Arc::clone(cancel));
    ctx.register_definitions();
    for root in &design.roots {
        ctx.traverse_root(*root);
    }
    ctx.finish()
}

/// Walks independent root groups on the rayon pool, one usage shard per
/// group, then merges the shards.
#[cfg(feature = "parallel")]
pub fn traverse_parallel(
    design: &Design,
    index: &MemberIndex,
    cancel: &Arc<AtomicBool>,
) -> TraversalOutcome {
    use rayon::prelude::*;

    let groups = independent_root_groups(design);
    let shards: Vec<TraversalOutcome> = groups
        .par_iter()
        .map(|group| {
            let mut ctx = AnalysisContext::new(design, index, Arc::clone(cancel));
            for root in group {
                ctx.traverse_root(*root);
            }
            ctx.finish()
        })
        .collect();

    let mut usage = UsageTable::new(design.decls.len());
    for def in &design.definitions {
        usage.register(*def);
    }
    let mut complete = true;
    let mut stats = TraversalStats::default();
    for shard in &shards {
        usage.merge(&shard.usage);
        complete &= shard.complete;
        stats.add(&shard.stats);
    }
    tracing::debug!(shards = shards.len(), "merged usage shards");

    TraversalOutcome {
        usage,
        complete,
        stats,
    }
}

/// Splits the roots into groups that reach no common definition, keeping
/// root order inside each group.
///
/// Handle bindings made while walking one instance are seen by later
/// instances of the same definition, so roots sharing a definition must share
/// a context. Compilation-unit roots hold classes and packages that any tree
/// may reach; with one present every root lands in a single group, and the
/// same holds when a hierarchical name reaches a handle.
#[cfg(feature = "parallel")]
pub(crate) fn independent_root_groups(design: &Design) -> Vec<Vec<ScopeId>> {
    use petgraph::unionfind::UnionFind;
    use std::collections::HashMap;

    let defs: Option<Vec<DeclId>> = design
        .roots
        .iter()
        .map(|root| design.scope(*root).definition())
        .collect();
    let Some(defs) = defs else {
        return vec![design.roots.clone()];
    };
    if has_hierarchical_handle_refs(design) {
        return vec![design.roots.clone()];
    }

    let g = build_hierarchy(design);
    let mut sets = UnionFind::new(defs.len());
    let mut first_reach: HashMap<DeclId, usize> = HashMap::new();
    for (i, def) in defs.iter().enumerate() {
        for reached in reachable_definitions(&g, [*def]) {
            let first = *first_reach.entry(reached).or_insert(i);
            sets.union(first, i);
        }
    }

    let mut groups: Vec<Vec<ScopeId>> = Vec::new();
    let mut slot: HashMap<usize, usize> = HashMap::new();
    for (i, root) in design.roots.iter().enumerate() {
        let at = *slot.entry(sets.find_mut(i)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[at].push(*root);
    }
    groups
}

#[cfg(feature = "parallel")]
fn has_hierarchical_handle_refs(design: &Design) -> bool {
    let mut found = false;
    for decl in &design.decls {
        for e in decl.dims.iter().chain(&decl.initializer) {
            handle_refs(design, e, &mut found);
        }
        if let DeclKind::Port {
            expression: Some(e),
            ..
        } = &decl.kind
        {
            handle_refs(design, e, &mut found);
        }
    }
    for scope in &design.scopes {
        for member in &scope.members {
            match member {
                Member::Instance(inst) => {
                    for e in inst.connections.iter().filter_map(|c| c.actual.as_ref()) {
                        handle_refs(design, e, &mut found);
                    }
                    for e in &inst.parameters {
                        handle_refs(design, e, &mut found);
                    }
                }
                Member::Generate {
                    condition: Some(e), ..
                }
                | Member::Observe(e) => handle_refs(design, e, &mut found),
                Member::ContinuousAssign { lhs, rhs } => {
                    handle_refs(design, lhs, &mut found);
                    handle_refs(design, rhs, &mut found);
                }
                Member::Procedure { body, .. } => stmt_handle_refs(design, body, &mut found),
                _ => {}
            }
        }
    }
    found
}

#[cfg(feature = "parallel")]
fn stmt_handle_refs(design: &Design, stmt: &Stmt, found: &mut bool) {
    let (exprs, stmts) = stmt.parts();
    for e in exprs {
        handle_refs(design, e, found);
    }
    for s in stmts {
        stmt_handle_refs(design, s, found);
    }
}

#[cfg(feature = "parallel")]
fn handle_refs(design: &Design, expr: &Expr, found: &mut bool) {
    expr.walk(&mut |e| {
        if let Expr::Hierarchical { target, .. } = e {
            *found |= design.decl(*target).is_handle();
        }
    });
}

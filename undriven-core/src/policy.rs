//! Suppression and policy engine.
//!
//! Runs after traversal over the final usage table and decides, per
//! declaration, whether one diagnostic is emitted and which. Rules are tried
//! in order and the first match wins:
//!
//! 1. suppression: `unused`/`maybe_unused` attribute, `_` name prefix, or a
//!    configured ignore pattern
//! 2. unresolved aliasing: reached through a handle with an unknown source
//! 3. externally visible: package and class members
//! 4. dispatch on the declaration kind

use regex::Regex;

use crate::design::{Container, DeclId, DeclKind, Declaration, Design, Direction};
use crate::diagnostic::{DiagCode, Diagnostic};
use crate::error::{UndrivenError, UndrivenResult};
use crate::usage::{UsageRecord, UsageTable};

#[derive(Debug, Clone, Default)]
pub struct Policy {
    /// Script fragments have no real top module
    script_mode: bool,
    ignore: Vec<Regex>,
}

impl Policy {
    pub fn new(script_mode: bool, ignore_patterns: &[String]) -> UndrivenResult<Self> {
        let ignore = ignore_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| UndrivenError::config(format!("invalid ignore pattern '{}': {}", p, e)))
            })
            .collect::<UndrivenResult<Vec<_>>>()?;
        Ok(Self {
            script_mode,
            ignore,
        })
    }

    /// Diagnostics for every registered declaration, sorted by location.
    ///
    /// When `complete` is false only declarations of closed containers whose
    /// traversal finished are decided.
    pub fn evaluate(&self, design: &Design, usage: &UsageTable, complete: bool) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for &id in usage.order() {
            let decl = design.decl(id);
            if !complete && !(decl.container.is_closed() && usage.is_completed(id)) {
                continue;
            }
            if let Some(code) = self.decide(design, id, usage.record(id)) {
                tracing::trace!(decl = %decl.name, code = %code, "diagnostic");
                out.push(Diagnostic::warning(code, id, decl.name.clone(), decl.location.clone()));
            }
        }
        // stable: declarations sharing a location keep traversal order
        out.sort_by(|a, b| a.location.cmp(&b.location));
        out
    }

    pub fn decide(&self, design: &Design, id: DeclId, rec: &UsageRecord) -> Option<DiagCode> {
        let decl = design.decl(id);
        if self.is_suppressed(decl) || rec.unresolved || decl.container.is_externally_visible() {
            return None;
        }

        match &decl.kind {
            DeclKind::Definition { .. } => {
                let unused = !design.is_top(id) && !rec.constructed && !rec.is_read();
                unused.then_some(DiagCode::UnusedDefinition)
            }
            DeclKind::Port { direction, .. } => self.port(design, decl, *direction, rec),
            DeclKind::Net { implicit: true } => {
                (!rec.is_read() || !rec.is_written()).then_some(DiagCode::UnusedImplicitNet)
            }
            DeclKind::Net { implicit: false } => net(decl, rec),
            DeclKind::Variable => variable(decl, rec),
            DeclKind::Parameter => (!rec.is_read()).then_some(DiagCode::UnusedParameter),
            DeclKind::TypeParameter => (!rec.is_read()).then_some(DiagCode::UnusedTypeParameter),
            DeclKind::Typedef => (!rec.is_read()).then_some(DiagCode::UnusedTypedef),
            DeclKind::Argument { direction } => argument(decl, *direction, rec),
            DeclKind::ClockVar { .. } | DeclKind::ModportPort { .. } => None,
        }
    }

    pub fn is_suppressed(&self, decl: &Declaration) -> bool {
        decl.is_suppressed_by_attribute()
            || decl.has_underscore_name()
            || self.ignore.iter().any(|re| re.is_match(&decl.name))
    }

    fn port(&self, design: &Design, decl: &Declaration, direction: Direction, rec: &UsageRecord) -> Option<DiagCode> {
        let is_iface = decl.ty.is_interface_port();
        let on_top = match decl.container {
            Container::Definition(def) => design.is_top(def),
            _ => false,
        };

        if on_top {
            if self.script_mode {
                return None;
            }
            return if is_iface {
                Some(DiagCode::TopModuleIfacePort)
            } else if direction == Direction::Ref && decl.is_unnamed() {
                Some(DiagCode::TopModuleUnnamedRefPort)
            } else if direction == Direction::Ref {
                Some(DiagCode::TopModuleRefPort)
            } else {
                None
            };
        }

        // expression ports are accessed through the declarations they connect
        if matches!(decl.kind, DeclKind::Port { expression: Some(_), .. }) {
            return None;
        }
        if is_iface {
            return (!rec.is_accessed()).then_some(DiagCode::UnusedPort);
        }
        match direction {
            Direction::In => (!rec.is_read()).then_some(DiagCode::UnusedPort),
            Direction::Out => (!rec.is_written()).then_some(DiagCode::UndrivenPort),
            Direction::InOut => (!rec.is_accessed()).then_some(DiagCode::UnusedPort),
            Direction::Ref => None,
        }
    }
}

fn net(decl: &Declaration, rec: &UsageRecord) -> Option<DiagCode> {
    match (rec.is_read(), rec.is_written()) {
        (false, false) => Some(DiagCode::UnusedNet),
        (true, false) if !decl.has_initializer() => Some(DiagCode::UndrivenNet),
        (false, true) => Some(DiagCode::UnusedButSetNet),
        _ => None,
    }
}

fn variable(decl: &Declaration, rec: &UsageRecord) -> Option<DiagCode> {
    if rec.constructed {
        return None;
    }
    match (rec.is_read(), rec.is_written()) {
        (false, false) => Some(DiagCode::UnusedVariable),
        (false, true) => Some(DiagCode::UnusedButSetVariable),
        (true, false) if !decl.has_initializer() => Some(DiagCode::UnassignedVariable),
        (true, true)
            if rec.only_partial_writes() && rec.whole_reads() > 0 && !decl.has_initializer() =>
        {
            Some(DiagCode::UnassignedVariable)
        }
        _ => None,
    }
}

fn argument(decl: &Declaration, direction: Direction, rec: &UsageRecord) -> Option<DiagCode> {
    if let Container::Subroutine(info) = decl.container {
        // signatures fixed by overriding, foreign code or a missing body
        if info.is_virtual || info.dpi_import || !info.has_body {
            return None;
        }
    }
    if direction == Direction::Ref {
        return None;
    }
    let written_output = direction.is_output() && rec.is_written();
    (!rec.is_read() && !written_output).then_some(DiagCode::UnusedArgument)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::*;

    fn rec(reads: u32, writes: u32) -> UsageRecord {
        UsageRecord {
            reads,
            writes,
            ..Default::default()
        }
    }

    fn single(decl: Declaration) -> (Design, DeclId) {
        let mut b = DesignBuilder::new();
        let m = b.definition("m", DefinitionKind::Module, SourceLocation::new("p.sv", 1, 8));
        let body = b.instance_body(m, "m");
        let id = b.add_decl(body, decl);
        (b.build().unwrap(), id)
    }

    fn owner() -> Container {
        Container::Definition(DeclId(0))
    }

    fn decide(decl: Declaration, r: UsageRecord) -> Option<DiagCode> {
        let (design, id) = single(decl);
        Policy::default().decide(&design, id, &r)
    }

    #[test]
    fn test_variable_table() {
        let v = || Declaration::new("v", DeclKind::Variable, owner());
        assert_eq!(decide(v(), rec(0, 0)), Some(DiagCode::UnusedVariable));
        assert_eq!(decide(v(), rec(0, 2)), Some(DiagCode::UnusedButSetVariable));
        assert_eq!(decide(v(), rec(1, 0)), Some(DiagCode::UnassignedVariable));
        assert_eq!(decide(v().with_initializer(Expr::Literal), rec(1, 0)), None);
        assert_eq!(decide(v(), rec(1, 1)), None);
    }

    #[test]
    fn test_constructed_variable_is_used() {
        let v = Declaration::new("cov", DeclKind::Variable, owner());
        let mut r = rec(0, 1);
        r.constructed = true;
        assert_eq!(decide(v, r), None);
    }

    #[test]
    fn test_partial_writes_with_whole_read() {
        let v = || Declaration::new("v", DeclKind::Variable, owner());
        let r = UsageRecord {
            reads: 1,
            writes: 2,
            partial_writes: 2,
            ..Default::default()
        };
        assert_eq!(decide(v(), r.clone()), Some(DiagCode::UnassignedVariable));

        let partial_read = UsageRecord {
            partial_reads: 1,
            ..r
        };
        assert_eq!(decide(v(), partial_read), None);
    }

    #[test]
    fn test_net_table() {
        let n = || Declaration::new("n", DeclKind::Net { implicit: false }, owner());
        assert_eq!(decide(n(), rec(0, 0)), Some(DiagCode::UnusedNet));
        assert_eq!(decide(n(), rec(1, 0)), Some(DiagCode::UndrivenNet));
        assert_eq!(decide(n().with_initializer(Expr::Literal), rec(1, 0)), None);
        assert_eq!(decide(n().with_initializer(Expr::Literal), rec(0, 0)), Some(DiagCode::UnusedNet));
        assert_eq!(decide(n(), rec(0, 1)), Some(DiagCode::UnusedButSetNet));
    }

    #[test]
    fn test_implicit_net_needs_read_and_write() {
        let n = || Declaration::new("a", DeclKind::Net { implicit: true }, owner());
        assert_eq!(decide(n(), rec(1, 0)), Some(DiagCode::UnusedImplicitNet));
        assert_eq!(decide(n(), rec(0, 1)), Some(DiagCode::UnusedImplicitNet));
        assert_eq!(decide(n(), rec(0, 0)), Some(DiagCode::UnusedImplicitNet));
        assert_eq!(decide(n(), rec(1, 1)), None);
    }

    #[test]
    fn test_argument_rules() {
        let arg = |dir, info| {
            Declaration::new("a", DeclKind::Argument { direction: dir }, Container::Subroutine(info))
        };
        let plain = SubroutineInfo::default();
        assert_eq!(decide(arg(Direction::In, plain), rec(0, 0)), Some(DiagCode::UnusedArgument));
        assert_eq!(decide(arg(Direction::Out, plain), rec(0, 1)), None);
        assert_eq!(decide(arg(Direction::Ref, plain), rec(0, 0)), None);
        let virt = SubroutineInfo {
            is_virtual: true,
            ..plain
        };
        assert_eq!(decide(arg(Direction::In, virt), rec(0, 0)), None);
        let dpi = SubroutineInfo {
            dpi_import: true,
            has_body: false,
            ..plain
        };
        assert_eq!(decide(arg(Direction::In, dpi), rec(0, 0)), None);
    }

    #[test]
    fn test_suppression_wins() {
        let attr = Declaration::new("foo", DeclKind::Variable, owner()).with_suppression(Suppression::MaybeUnused);
        assert_eq!(decide(attr, rec(0, 0)), None);
        let under = Declaration::new("_", DeclKind::Variable, owner());
        assert_eq!(decide(under, rec(0, 0)), None);
    }

    #[test]
    fn test_unresolved_suppresses() {
        let v = Declaration::new("v", DeclKind::Variable, owner());
        let r = UsageRecord {
            unresolved: true,
            ..Default::default()
        };
        assert_eq!(decide(v, r), None);
    }

    #[test]
    fn test_class_and_package_members_exempt() {
        let field = Declaration::new("f", DeclKind::Variable, Container::Class);
        assert_eq!(decide(field, rec(0, 0)), None);
        let pkg = Declaration::new("p", DeclKind::Parameter, Container::Package);
        assert_eq!(decide(pkg, rec(0, 0)), None);
    }

    #[test]
    fn test_ignore_patterns() {
        let policy = Policy::new(false, &["^dbg_".to_string()]).unwrap();
        let (design, id) = single(Declaration::new("dbg_state", DeclKind::Variable, owner()));
        assert_eq!(policy.decide(&design, id, &rec(0, 0)), None);
    }

    #[test]
    fn test_invalid_ignore_pattern() {
        let err = Policy::new(false, &["(".to_string()]).unwrap_err();
        assert!(matches!(err, UndrivenError::Config { .. }));
    }

    #[test]
    fn test_port_rules_below_top() {
        let port = |dir| {
            Declaration::new(
                "p",
                DeclKind::Port {
                    direction: dir,
                    expression: None,
                },
                owner(),
            )
        };
        assert_eq!(decide(port(Direction::In), rec(0, 0)), Some(DiagCode::UnusedPort));
        assert_eq!(decide(port(Direction::Out), rec(0, 0)), Some(DiagCode::UndrivenPort));
        assert_eq!(decide(port(Direction::Out), rec(3, 0)), Some(DiagCode::UndrivenPort));
        assert_eq!(decide(port(Direction::InOut), rec(0, 0)), Some(DiagCode::UnusedPort));
        assert_eq!(decide(port(Direction::Ref), rec(0, 0)), None);
    }

    #[test]
    fn test_expression_port_below_top_is_exempt() {
        let port = |dir| {
            Declaration::new(
                "p",
                DeclKind::Port {
                    direction: dir,
                    expression: Some(Expr::Concat(vec![Expr::Literal])),
                },
                owner(),
            )
        };
        assert_eq!(decide(port(Direction::In), rec(0, 0)), None);
        assert_eq!(decide(port(Direction::Out), rec(0, 0)), None);
    }
}

//! Access classification.
//!
//! Turns one bound expression occurrence, together with the syntactic role it
//! appears in, into the list of declaration accesses it performs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐      ┌─────────────────────┐
//! │   traverse.rs       │ expr │   classify/mod.rs   │
//! │  statement walker   │─────▶│  role propagation   │
//! │                     │ role │  selects, members,  │
//! │                     │◀─────│  calls, methods     │
//! └─────────────────────┘ acc. └──────────┬──────────┘
//!                                         │ h.member, alias decls
//!                              ┌──────────▼──────────┐      ┌───────────────┐
//!                              │     alias.rs        │      │  system.rs    │
//!                              │  handle -> scopes   │      │  output args  │
//!                              └─────────────────────┘      └───────────────┘
//! ```
//!
//! Classification is pure: it reads the design and the current alias map and
//! returns [`Access`] records plus the handle assignments nested in the
//! expression, which the traversal applies afterwards.

pub mod system;

use crate::alias::{AliasResolver, Place, MAX_ALIAS_DEPTH};
use crate::design::{CallTarget, DataType, DeclId, Design, Direction, Expr};

/// How an occurrence touches a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    ReadWrite,
    /// Object or covergroup constructed into the target
    Construct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Use {
        decl: DeclId,
        kind: AccessKind,
        /// Only a bit range, element or field of the declaration
        partial: bool,
    },
    /// Reached through a handle with an unknown source; never counted
    Unresolved(DeclId),
}

/// Syntactic position an expression occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Read,
    Write,
    ReadWrite,
    /// `@e`
    EventWait,
    /// `->e`
    EventTrigger,
    /// Call argument bound to a formal of this direction
    Argument(Direction),
    /// Target of an assignment from `new`
    Construct,
}

impl Role {
    pub fn kind(self) -> AccessKind {
        match self {
            Self::Read | Self::EventWait | Self::Argument(Direction::In) => AccessKind::Read,
            Self::Write | Self::EventTrigger | Self::Argument(Direction::Out) => AccessKind::Write,
            Self::ReadWrite | Self::Argument(Direction::InOut) | Self::Argument(Direction::Ref) => {
                AccessKind::ReadWrite
            }
            Self::Construct => AccessKind::Construct,
        }
    }

    pub fn writes(self) -> bool {
        !matches!(self.kind(), AccessKind::Read)
    }

    /// Role of the target of an assignment from `rhs`.
    pub fn assignment_target(rhs: &Expr) -> Self {
        if rhs.is_new() {
            Self::Construct
        } else {
            Self::Write
        }
    }

    /// Role of the internal side of a port: inputs drive the inside,
    /// outputs are read from it.
    pub fn port_internal(direction: Direction) -> Self {
        match direction {
            Direction::In => Self::Write,
            Direction::Out => Self::Read,
            Direction::InOut | Direction::Ref => Self::ReadWrite,
        }
    }
}

/// Result of classifying one expression occurrence.
#[derive(Debug, Default)]
pub struct Classification<'e> {
    pub accesses: Vec<Access>,
    /// Assignments nested in the expression, as `(lhs, rhs)`
    pub bindings: Vec<(&'e Expr, &'e Expr)>,
}

pub struct Classifier<'r, 'd> {
    design: &'d Design,
    resolver: &'r AliasResolver<'d>,
}

impl<'r, 'd> Classifier<'r, 'd> {
    pub fn new(design: &'d Design, resolver: &'r AliasResolver<'d>) -> Self {
        Self { design, resolver }
    }

    pub fn classify<'e>(&self, expr: &'e Expr, role: Role) -> Classification<'e> {
        let mut out = Classification::default();
        self.visit(expr, role, false, 0, &mut out);
        out
    }

    /// Uses recorded by a type reference (typedef, type parameter,
    /// interface definition).
    pub fn classify_type(&self, ty: &DataType) -> Vec<Access> {
        let mut out = Classification::default();
        self.read_type(ty, &mut out);
        out.accesses
    }

    fn visit<'e>(&self, expr: &'e Expr, role: Role, partial: bool, depth: usize, out: &mut Classification<'e>) {
        match expr {
            Expr::Literal | Expr::Null | Expr::Instance(_) => {}
            Expr::Name(id) | Expr::Hierarchical { target: id, .. } => {
                self.access(*id, role, partial, depth, out)
            }
            Expr::Select { base, indices } => {
                for index in indices {
                    self.visit(index, Role::Read, false, depth, out);
                }
                // an element write into a dynamic container replaces a whole entry
                let whole = role.writes() && self.is_dynamic(base);
                self.visit(base, role, partial || !whole, depth, out);
            }
            Expr::Member { base, member } => self.member(base, member, role, partial, depth, out),
            Expr::Concat(items) => {
                for item in items {
                    self.visit(item, role, partial, depth, out);
                }
            }
            Expr::Operation(operands) => {
                for op in operands {
                    self.visit(op, Role::Read, false, depth, out);
                }
            }
            Expr::Conditional { cond, left, right } => {
                self.visit(cond, Role::Read, false, depth, out);
                self.visit(left, role, partial, depth, out);
                self.visit(right, role, partial, depth, out);
            }
            Expr::Assign { lhs, rhs, compound } => {
                self.visit(rhs, Role::Read, false, depth, out);
                let target = if *compound {
                    Role::ReadWrite
                } else {
                    Role::assignment_target(rhs)
                };
                self.visit(lhs, target, false, depth, out);
                out.bindings.push((&**lhs, &**rhs));
            }
            Expr::IncDec(operand) => self.visit(operand, Role::ReadWrite, partial, depth, out),
            Expr::Call { target, args } => match target {
                CallTarget::Subroutine(sub) => {
                    let formals = self.design.arguments(*sub);
                    for (i, arg) in args.iter().enumerate() {
                        if let Some(arg) = arg {
                            let dir = formals
                                .get(i)
                                .and_then(|f| self.design.decl(*f).kind.direction())
                                .unwrap_or(Direction::In);
                            self.visit(arg, Role::Argument(dir), false, depth, out);
                        }
                    }
                }
                CallTarget::System(name) => {
                    for (i, arg) in args.iter().enumerate() {
                        if let Some(arg) = arg {
                            let dir = system::arg_direction(name, i);
                            self.visit(arg, Role::Argument(dir), false, depth, out);
                        }
                    }
                }
            },
            Expr::MethodCall {
                receiver,
                method,
                args,
                target,
            } => {
                let receiver_role = if system::is_mutating_method(method) && self.is_mutable_receiver(receiver) {
                    Role::ReadWrite
                } else {
                    Role::Read
                };
                self.visit(receiver, receiver_role, false, depth, out);

                let formals = target.map(|t| self.design.arguments(t)).unwrap_or_default();
                for (i, arg) in args.iter().enumerate() {
                    let dir = match formals.get(i) {
                        Some(f) => self.design.decl(*f).kind.direction().unwrap_or(Direction::In),
                        None if system::is_randomize(method) => Direction::Out,
                        None => Direction::In,
                    };
                    self.visit(arg, Role::Argument(dir), false, depth, out);
                }
            }
            Expr::New { args, .. } => {
                for arg in args {
                    self.visit(arg, Role::Read, false, depth, out);
                }
            }
            Expr::EnumValue { typedef } => {
                if let Some(t) = typedef {
                    self.access(*t, Role::Read, false, depth, out);
                }
            }
            Expr::ScopedName { prefix, target } => {
                self.read_type(prefix, out);
                self.access(*target, Role::Read, false, depth, out);
            }
            Expr::Cast { ty, operand } => {
                self.read_type(ty, out);
                self.visit(operand, Role::Read, false, depth, out);
            }
            Expr::TypeOperand(ty) => self.read_type(ty, out),
        }
    }

    fn member<'e>(
        &self,
        base: &'e Expr,
        member: &str,
        role: Role,
        partial: bool,
        depth: usize,
        out: &mut Classification<'e>,
    ) {
        if self.resolver.is_indirection(base) {
            // the handle itself is read to reach the member
            self.visit(base, Role::Read, false, depth, out);

            let res = self.resolver.resolve(base);
            for scope in &res.scopes {
                let Some(Place::Decl(id)) = self.resolver.index().lookup(self.design, *scope, member) else {
                    continue;
                };
                if res.unresolved {
                    for u in self.resolver.underlying(id) {
                        out.accesses.push(Access::Unresolved(u));
                    }
                } else {
                    self.access(id, role, partial, depth, out);
                }
            }
            return;
        }

        match base {
            Expr::Call { .. } | Expr::MethodCall { .. } | Expr::New { .. } => {
                self.visit(base, Role::Read, false, depth, out)
            }
            // struct or union field
            _ => self.visit(base, role, true, depth, out),
        }
    }

    fn access(&self, id: DeclId, role: Role, partial: bool, depth: usize, out: &mut Classification<'_>) {
        let decl = self.design.decl(id);
        if let Some(target) = decl.kind.alias_target() {
            // clocking signals and modport ports pass the access through
            if depth < MAX_ALIAS_DEPTH {
                let mut inner = Classification::default();
                self.visit(target, role, partial, depth + 1, &mut inner);
                out.accesses.extend(inner.accesses);
            }
            return;
        }
        out.accesses.push(Access::Use {
            decl: id,
            kind: role.kind(),
            partial,
        });
    }

    fn read_type(&self, ty: &DataType, out: &mut Classification<'_>) {
        for id in ty.referenced_decls() {
            self.access(id, Role::Read, false, 0, out);
        }
    }

    fn static_type(&self, expr: &Expr) -> Option<&'d DataType> {
        let design = self.design;
        match expr {
            Expr::Name(id) | Expr::Hierarchical { target: id, .. } => {
                let decl = design.decl(*id);
                match decl.kind.alias_target() {
                    Some(target) => self.static_type(target),
                    None => Some(&decl.ty),
                }
            }
            Expr::Member { base, member } if self.resolver.is_indirection(base) => {
                self.resolver.resolve(base).scopes.iter().find_map(|s| {
                    match self.resolver.index().lookup(design, *s, member) {
                        Some(Place::Decl(id)) => Some(&design.decl(id).ty),
                        _ => None,
                    }
                })
            }
            _ => None,
        }
    }

    fn is_dynamic(&self, expr: &Expr) -> bool {
        self.static_type(expr)
            .map(DataType::is_dynamic_container)
            .unwrap_or(false)
    }

    /// Containers and strings have mutating built-in methods; an unknown
    /// receiver type is assumed to.
    fn is_mutable_receiver(&self, expr: &Expr) -> bool {
        match self.static_type(expr) {
            Some(ty) => matches!(ty.canonical(), DataType::Container { .. } | DataType::String),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::MemberIndex;
    use crate::design::*;

    struct Bench {
        design: Design,
        cls: DeclId,
        x: DeclId,
        q: DeclId,
        s: DeclId,
        ev: DeclId,
        h: DeclId,
        field: DeclId,
        f: ScopeId,
    }

    fn bench() -> Bench {
        let mut b = DesignBuilder::new();
        let m = b.definition("m", DefinitionKind::Module, SourceLocation::new("b.sv", 1, 8));
        b.top(m);
        let cu = b.scope("$unit", ScopeKind::CompilationUnit);
        b.root(cu);
        let class = b.nested(cu, "C", ScopeKind::Class { base: None });
        let field = b.add_decl(class, Declaration::new("field", DeclKind::Variable, Container::Class));
        let cls = b.add_decl(cu, Declaration::new("T", DeclKind::Typedef, Container::CompilationUnit));

        let f = b.nested(cu, "f", ScopeKind::Subroutine);
        let sub = Container::Subroutine(SubroutineInfo::default());
        b.add_decl(f, Declaration::new("a", DeclKind::Argument { direction: Direction::In }, sub));
        b.add_decl(f, Declaration::new("r", DeclKind::Argument { direction: Direction::Ref }, sub));

        let body = b.instance_body(m, "m");
        b.root(body);
        let owner = Container::Definition(m);
        let x = b.add_decl(body, Declaration::new("x", DeclKind::Variable, owner));
        let q = b.add_decl(
            body,
            Declaration::new("q", DeclKind::Variable, owner)
                .with_type(DataType::container(ContainerType::Queue, DataType::Scalar)),
        );
        let s = b.add_decl(body, Declaration::new("s", DeclKind::Variable, owner).with_type(DataType::String));
        let ev = b.add_decl(body, Declaration::new("e", DeclKind::Variable, owner).with_type(DataType::Event));
        let h = b.add_decl(
            body,
            Declaration::new("h", DeclKind::Variable, owner).with_type(DataType::Class(class)),
        );

        Bench {
            design: b.build().unwrap(),
            cls,
            x,
            q,
            s,
            ev,
            h,
            field,
            f,
        }
    }

    fn run(bench: &Bench, expr: &Expr, role: Role) -> Vec<Access> {
        let index = MemberIndex::build(&bench.design);
        let resolver = AliasResolver::new(&bench.design, &index);
        Classifier::new(&bench.design, &resolver).classify(expr, role).accesses
    }

    fn use_of(decl: DeclId, kind: AccessKind, partial: bool) -> Access {
        Access::Use { decl, kind, partial }
    }

    #[test]
    fn test_bit_select_write_is_partial() {
        let b = bench();
        let lhs = Expr::select(Expr::Name(b.x), vec![Expr::Literal]);
        assert_eq!(run(&b, &lhs, Role::Write), vec![use_of(b.x, AccessKind::Write, true)]);
    }

    #[test]
    fn test_container_element_write_is_full() {
        let b = bench();
        let lhs = Expr::select(Expr::Name(b.q), vec![Expr::Name(b.x)]);
        assert_eq!(
            run(&b, &lhs, Role::Write),
            vec![
                use_of(b.x, AccessKind::Read, false),
                use_of(b.q, AccessKind::Write, false),
            ]
        );
    }

    #[test]
    fn test_ref_argument_reads_and_writes() {
        let b = bench();
        let call = Expr::call(b.f, vec![Expr::Name(b.x), Expr::Name(b.s)]);
        assert_eq!(
            run(&b, &call, Role::Read),
            vec![
                use_of(b.x, AccessKind::Read, false),
                use_of(b.s, AccessKind::ReadWrite, false),
            ]
        );
    }

    #[test]
    fn test_sscanf_outputs() {
        let b = bench();
        let call = Expr::system(
            "$sscanf",
            vec![Expr::Name(b.s), Expr::Literal, Expr::Name(b.x)],
        );
        assert_eq!(
            run(&b, &call, Role::Read),
            vec![
                use_of(b.s, AccessKind::Read, false),
                use_of(b.x, AccessKind::Write, false),
            ]
        );
    }

    #[test]
    fn test_mutating_methods_on_containers_and_strings() {
        let b = bench();
        let push = Expr::method(Expr::Name(b.q), "push_back", vec![Expr::Name(b.x)]);
        assert_eq!(
            run(&b, &push, Role::Read),
            vec![
                use_of(b.q, AccessKind::ReadWrite, false),
                use_of(b.x, AccessKind::Read, false),
            ]
        );
        let len = Expr::method(Expr::Name(b.s), "len", vec![]);
        assert_eq!(run(&b, &len, Role::Read), vec![use_of(b.s, AccessKind::Read, false)]);
    }

    #[test]
    fn test_event_trigger_and_wait() {
        let b = bench();
        let e = Expr::Name(b.ev);
        assert_eq!(run(&b, &e, Role::EventTrigger), vec![use_of(b.ev, AccessKind::Write, false)]);
        assert_eq!(run(&b, &e, Role::EventWait), vec![use_of(b.ev, AccessKind::Read, false)]);
    }

    #[test]
    fn test_handle_member_reads_handle() {
        let b = bench();
        let lhs = Expr::member(Expr::Name(b.h), "field");
        assert_eq!(
            run(&b, &lhs, Role::Write),
            vec![
                use_of(b.h, AccessKind::Read, false),
                use_of(b.field, AccessKind::Write, false),
            ]
        );
    }

    #[test]
    fn test_nested_assignment_is_reported_as_binding() {
        let b = bench();
        let expr = Expr::Assign {
            lhs: Box::new(Expr::Name(b.h)),
            rhs: Box::new(Expr::new_object(None)),
            compound: false,
        };
        let index = MemberIndex::build(&b.design);
        let resolver = AliasResolver::new(&b.design, &index);
        let c = Classifier::new(&b.design, &resolver).classify(&expr, Role::Read);
        assert_eq!(c.accesses, vec![use_of(b.h, AccessKind::Construct, false)]);
        assert_eq!(c.bindings.len(), 1);
    }

    #[test]
    fn test_enum_value_and_cast_read_types() {
        let b = bench();
        let e = Expr::EnumValue { typedef: Some(b.cls) };
        assert_eq!(run(&b, &e, Role::Read), vec![use_of(b.cls, AccessKind::Read, false)]);
        let cast = Expr::Cast {
            ty: DataType::named(b.cls, DataType::Scalar),
            operand: Box::new(Expr::Name(b.x)),
        };
        assert_eq!(
            run(&b, &cast, Role::Read),
            vec![
                use_of(b.cls, AccessKind::Read, false),
                use_of(b.x, AccessKind::Read, false),
            ]
        );
    }

    #[test]
    fn test_port_internal_roles() {
        assert_eq!(Role::port_internal(Direction::In).kind(), AccessKind::Write);
        assert_eq!(Role::port_internal(Direction::Out).kind(), AccessKind::Read);
        assert_eq!(Role::port_internal(Direction::Ref).kind(), AccessKind::ReadWrite);
    }
}

//! Declarations and their static shape.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::expr::Expr;
use super::{DeclId, ScopeId};

/// Position of a declaration in the source text.
///
/// Ordering is file, then line, then column; diagnostics are emitted in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Source-level suppression attribute attached to a declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suppression {
    #[default]
    None,
    /// `(* unused *)`
    Unused,
    /// `(* maybe_unused *)`
    MaybeUnused,
}

/// Direction of a port, argument, clocking signal or modport port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
    InOut,
    Ref,
}

impl Direction {
    /// Whether a value can flow out of the callee/instance through this direction.
    pub fn is_output(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    Module,
    Interface,
    Program,
}

/// Facts about the subroutine a declaration lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubroutineInfo {
    /// Virtual class method (overrides must keep the signature)
    #[serde(default)]
    pub is_virtual: bool,
    /// False for prototypes: pure virtual, extern without body, DPI imports
    #[serde(default = "default_true")]
    pub has_body: bool,
    /// `import "DPI-C"` function
    #[serde(default)]
    pub dpi_import: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SubroutineInfo {
    fn default() -> Self {
        Self {
            is_virtual: false,
            has_body: true,
            dpi_import: false,
        }
    }
}

/// Kind of syntactic container that owns a declaration.
///
/// Declarations are definition-level: every instance body of a definition
/// refers to the same declaration, so the container names the definition
/// rather than a particular instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    Definition(DeclId),
    Package,
    Class,
    Subroutine(SubroutineInfo),
    Block,
    CompilationUnit,
}

impl Container {
    /// Members of packages and classes are reachable by name from outside
    /// the analyzed bodies, so their usage cannot be judged locally.
    pub fn is_externally_visible(self) -> bool {
        matches!(self, Self::Package | Self::Class)
    }

    /// Declarations whose every reference lies inside their container.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Subroutine(_) | Self::Block)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    Queue,
    Dynamic,
    Associative,
}

/// Declared type, reduced to what usage analysis needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Integral, real and other value types with no usage-relevant structure
    #[default]
    Scalar,
    String,
    Event,
    /// Unpacked dynamic container of `element`
    Container {
        kind: ContainerType,
        #[serde(default)]
        element: Box<DataType>,
    },
    /// Reference to a typedef or type parameter. `resolved` is the type it
    /// stands for after elaboration.
    Named {
        decl: DeclId,
        #[serde(default)]
        resolved: Box<DataType>,
    },
    /// Class handle
    Class(ScopeId),
    VirtualInterface {
        definition: DeclId,
        #[serde(default)]
        modport: Option<String>,
    },
    /// Interface port type
    Interface {
        definition: DeclId,
        #[serde(default)]
        modport: Option<String>,
    },
    Covergroup(ScopeId),
}

impl DataType {
    pub fn container(kind: ContainerType, element: DataType) -> Self {
        Self::Container {
            kind,
            element: Box::new(element),
        }
    }

    pub fn named(decl: DeclId, resolved: DataType) -> Self {
        Self::Named {
            decl,
            resolved: Box::new(resolved),
        }
    }

    /// The type with every typedef and type parameter looked through.
    pub fn canonical(&self) -> &DataType {
        let mut ty = self;
        while let Self::Named { resolved, .. } = ty {
            ty = resolved;
        }
        ty
    }

    /// Handle-typed values denote another scope rather than storage.
    pub fn is_handle(&self) -> bool {
        matches!(
            self.canonical(),
            Self::Class(_) | Self::VirtualInterface { .. } | Self::Interface { .. } | Self::Covergroup(_)
        )
    }

    pub fn is_dynamic_container(&self) -> bool {
        matches!(self.canonical(), Self::Container { .. })
    }

    pub fn is_interface_port(&self) -> bool {
        matches!(self.canonical(), Self::Interface { .. })
    }

    /// Declarations this type names directly: the outermost typedef, the
    /// element typedefs of containers, interface definitions.
    ///
    /// A typedef's own underlying type is not included; the typedef
    /// declaration records those uses itself.
    pub fn referenced_decls(&self) -> Vec<DeclId> {
        let mut out = Vec::new();
        let mut ty = self;
        loop {
            match ty {
                Self::Named { decl, .. } => {
                    out.push(*decl);
                    break;
                }
                Self::Container { element, .. } => ty = element,
                Self::VirtualInterface { definition, .. } | Self::Interface { definition, .. } => {
                    out.push(*definition);
                    break;
                }
                _ => break,
            }
        }
        out
    }

    pub fn modport(&self) -> Option<&str> {
        match self.canonical() {
            Self::VirtualInterface { modport, .. } | Self::Interface { modport, .. } => {
                modport.as_deref()
            }
            _ => None,
        }
    }
}

/// Closed set of declaration kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Net {
        #[serde(default)]
        implicit: bool,
    },
    Variable,
    /// Port of a definition. Named ports are their own internal storage;
    /// explicit port expressions connect to internal declarations instead.
    Port {
        direction: Direction,
        #[serde(default)]
        expression: Option<Expr>,
    },
    Parameter,
    TypeParameter,
    Typedef,
    Argument {
        direction: Direction,
    },
    Definition {
        kind: DefinitionKind,
    },
    /// Clocking-block signal; an alias of `target`
    ClockVar {
        direction: Direction,
        target: Expr,
    },
    /// Modport port; an alias of `target`
    ModportPort {
        direction: Direction,
        target: Expr,
    },
}

impl DeclKind {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Port { direction, .. }
            | Self::Argument { direction }
            | Self::ClockVar { direction, .. }
            | Self::ModportPort { direction, .. } => Some(*direction),
            _ => None,
        }
    }

    /// Alias declarations forward every access to their target.
    pub fn alias_target(&self) -> Option<&Expr> {
        match self {
            Self::ClockVar { target, .. } | Self::ModportPort { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// A declared entity. Immutable once the elaborator produces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    pub container: Container,
    pub location: SourceLocation,
    #[serde(default)]
    pub suppression: Suppression,
    #[serde(default)]
    pub ty: DataType,
    /// Packed and unpacked dimension expressions
    #[serde(default)]
    pub dims: Vec<Expr>,
    #[serde(default)]
    pub initializer: Option<Expr>,
}

impl Declaration {
    pub fn new(name: impl Into<String>, kind: DeclKind, container: Container) -> Self {
        Self {
            name: name.into(),
            kind,
            container,
            location: SourceLocation::default(),
            suppression: Suppression::None,
            ty: DataType::Scalar,
            dims: Vec::new(),
            initializer: None,
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_type(mut self, ty: DataType) -> Self {
        self.ty = ty;
        self
    }

    pub fn with_initializer(mut self, initializer: Expr) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn with_suppression(mut self, suppression: Suppression) -> Self {
        self.suppression = suppression;
        self
    }

    pub fn with_dims(mut self, dims: Vec<Expr>) -> Self {
        self.dims = dims;
        self
    }

    pub fn is_handle(&self) -> bool {
        match self.kind {
            DeclKind::Variable | DeclKind::Argument { .. } | DeclKind::Port { .. } => {
                self.ty.is_handle()
            }
            _ => false,
        }
    }

    pub fn has_initializer(&self) -> bool {
        self.initializer.is_some()
    }

    /// `_` and `_name` opt out of usage diagnostics.
    pub fn has_underscore_name(&self) -> bool {
        self.name.starts_with('_')
    }

    pub fn is_suppressed_by_attribute(&self) -> bool {
        self.suppression != Suppression::None
    }

    pub fn is_unnamed(&self) -> bool {
        self.name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_ordering() {
        let a = SourceLocation::new("a.sv", 3, 9);
        let b = SourceLocation::new("a.sv", 10, 1);
        let c = SourceLocation::new("b.sv", 1, 1);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.to_string(), "a.sv:3:9");
    }

    #[test]
    fn test_handle_detection() {
        let mut var = Declaration::new("h", DeclKind::Variable, Container::Class);
        assert!(!var.is_handle());
        var.ty = DataType::Class(ScopeId(4));
        assert!(var.is_handle());

        var.ty = DataType::named(DeclId(1), DataType::Class(ScopeId(4)));
        assert!(var.is_handle());

        let mut param = Declaration::new("p", DeclKind::Parameter, Container::Class);
        param.ty = DataType::Class(ScopeId(4));
        assert!(!param.is_handle());
    }

    #[test]
    fn test_type_references_look_through_containers() {
        let queue = DataType::container(ContainerType::Queue, DataType::named(DeclId(3), DataType::Scalar));
        assert_eq!(queue.referenced_decls(), vec![DeclId(3)]);
        assert!(queue.is_dynamic_container());

        let alias = DataType::named(DeclId(5), queue.clone());
        assert_eq!(alias.referenced_decls(), vec![DeclId(5)]);
        assert!(alias.is_dynamic_container());
        assert_eq!(alias.canonical(), &queue);

        let decoded: DataType = serde_json::from_str(r#"{"named":{"decl":2}}"#).unwrap();
        assert_eq!(decoded, DataType::named(DeclId(2), DataType::Scalar));
    }

    #[test]
    fn test_underscore_names() {
        let bare = Declaration::new("_", DeclKind::Variable, Container::Block);
        let prefixed = Declaration::new("_tmp", DeclKind::Variable, Container::Block);
        let plain = Declaration::new("tmp_", DeclKind::Variable, Container::Block);
        assert!(bare.has_underscore_name());
        assert!(prefixed.has_underscore_name());
        assert!(!plain.has_underscore_name());
    }

    #[test]
    fn test_container_visibility() {
        assert!(Container::Package.is_externally_visible());
        assert!(Container::Class.is_externally_visible());
        assert!(!Container::Block.is_externally_visible());
        assert!(Container::Subroutine(SubroutineInfo::default()).is_closed());
        assert!(!Container::Definition(DeclId(0)).is_closed());
    }

    #[test]
    fn test_subroutine_info_defaults_to_body() {
        let info: SubroutineInfo = serde_json::from_str("{}").unwrap();
        assert!(info.has_body);
        assert!(!info.is_virtual);
    }
}

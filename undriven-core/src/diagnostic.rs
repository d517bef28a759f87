//! Diagnostic codes and records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::design::{DeclId, SourceLocation};

/// Closed set of usage diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagCode {
    UnusedDefinition,
    UnusedPort,
    UndrivenPort,
    TopModuleIfacePort,
    TopModuleUnnamedRefPort,
    TopModuleRefPort,
    UnusedButSetVariable,
    UnassignedVariable,
    UnusedVariable,
    UnusedNet,
    UndrivenNet,
    UnusedButSetNet,
    UnusedImplicitNet,
    UnusedParameter,
    UnusedTypeParameter,
    UnusedTypedef,
    UnusedArgument,
}

impl DiagCode {
    pub const ALL: [DiagCode; 17] = [
        Self::UnusedDefinition,
        Self::UnusedPort,
        Self::UndrivenPort,
        Self::TopModuleIfacePort,
        Self::TopModuleUnnamedRefPort,
        Self::TopModuleRefPort,
        Self::UnusedButSetVariable,
        Self::UnassignedVariable,
        Self::UnusedVariable,
        Self::UnusedNet,
        Self::UndrivenNet,
        Self::UnusedButSetNet,
        Self::UnusedImplicitNet,
        Self::UnusedParameter,
        Self::UnusedTypeParameter,
        Self::UnusedTypedef,
        Self::UnusedArgument,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::UnusedDefinition => "UnusedDefinition",
            Self::UnusedPort => "UnusedPort",
            Self::UndrivenPort => "UndrivenPort",
            Self::TopModuleIfacePort => "TopModuleIfacePort",
            Self::TopModuleUnnamedRefPort => "TopModuleUnnamedRefPort",
            Self::TopModuleRefPort => "TopModuleRefPort",
            Self::UnusedButSetVariable => "UnusedButSetVariable",
            Self::UnassignedVariable => "UnassignedVariable",
            Self::UnusedVariable => "UnusedVariable",
            Self::UnusedNet => "UnusedNet",
            Self::UndrivenNet => "UndrivenNet",
            Self::UnusedButSetNet => "UnusedButSetNet",
            Self::UnusedImplicitNet => "UnusedImplicitNet",
            Self::UnusedParameter => "UnusedParameter",
            Self::UnusedTypeParameter => "UnusedTypeParameter",
            Self::UnusedTypedef => "UnusedTypedef",
            Self::UnusedArgument => "UnusedArgument",
        }
    }

    /// Short human-readable text; the symbol name is appended by the reporter.
    pub fn message(self) -> &'static str {
        match self {
            Self::UnusedDefinition => "definition is never instantiated",
            Self::UnusedPort => "port is never used",
            Self::UndrivenPort => "output port is never driven",
            Self::TopModuleIfacePort => "top-level module has an interface port",
            Self::TopModuleUnnamedRefPort => "top-level module has an unnamed ref port",
            Self::TopModuleRefPort => "top-level module has a ref port",
            Self::UnusedButSetVariable => "variable is assigned but never read",
            Self::UnassignedVariable => "variable is read but never assigned",
            Self::UnusedVariable => "variable is never used",
            Self::UnusedNet => "net is never used",
            Self::UndrivenNet => "net is read but never driven",
            Self::UnusedButSetNet => "net is driven but never read",
            Self::UnusedImplicitNet => "implicitly declared net is not both driven and read",
            Self::UnusedParameter => "parameter is never referenced",
            Self::UnusedTypeParameter => "type parameter is never referenced",
            Self::UnusedTypedef => "typedef is never referenced",
            Self::UnusedArgument => "argument is never used",
        }
    }
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
}

/// One emitted finding. Never mutated after the policy engine creates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagCode,
    pub location: SourceLocation,
    pub severity: Severity,
    /// Declaration the finding is about
    pub decl: DeclId,
    /// Its surface name (empty for unnamed ports)
    pub symbol: String,
}

impl Diagnostic {
    pub fn warning(code: DiagCode, decl: DeclId, symbol: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            code,
            location,
            severity: Severity::Warning,
            decl,
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: warning: {}", self.location, self.code.message())?;
        if !self.symbol.is_empty() {
            write!(f, " '{}'", self.symbol)?;
        }
        write!(f, " [{}]", self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_names_are_unique() {
        let mut names: Vec<_> = DiagCode::ALL.iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 17);
    }

    #[test]
    fn test_serde_name_matches_display() {
        for code in DiagCode::ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code));
        }
    }

    #[test]
    fn test_display_includes_symbol_and_code() {
        let diag = Diagnostic::warning(
            DiagCode::UnusedNet,
            DeclId(3),
            "j",
            SourceLocation::new("m.sv", 10, 10),
        );
        assert_eq!(diag.to_string(), "m.sv:10:10: warning: net is never used 'j' [UnusedNet]");
    }

    #[test]
    fn test_display_omits_empty_symbol() {
        let diag = Diagnostic::warning(
            DiagCode::TopModuleUnnamedRefPort,
            DeclId(0),
            "",
            SourceLocation::new("t.sv", 2, 13),
        );
        assert!(!diag.to_string().contains("''"));
    }
}

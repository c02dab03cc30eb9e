//! The SrcLang type lattice.

use srclang_parser::ast::TypeName;
use std::fmt;
use std::str::FromStr;

/// A SrcLang type.
///
/// `Function` carries the return type; parameter types live in the
/// callee's function scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Integer,
    Bool,
    Void,
    Function(Box<Ty>),
}

impl Ty {
    /// Return type of a function type.
    pub fn return_type(&self) -> Option<&Ty> {
        match self {
            Ty::Function(ret) => Some(ret),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Ty::Function(_))
    }

    /// Whether a value of this type can be stored in a variable.
    pub fn is_value_type(&self) -> bool {
        matches!(self, Ty::Integer | Ty::Bool)
    }
}

impl From<TypeName> for Ty {
    fn from(name: TypeName) -> Self {
        match name {
            TypeName::Integer => Ty::Integer,
            TypeName::Bool => Ty::Bool,
            TypeName::Void => Ty::Void,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Integer => write!(f, "integer"),
            Ty::Bool => write!(f, "bool"),
            Ty::Void => write!(f, "void"),
            Ty::Function(ret) => write!(f, "function:{}", ret),
        }
    }
}

impl FromStr for Ty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(Ty::Integer),
            "bool" => Ok(Ty::Bool),
            "void" => Ok(Ty::Void),
            _ => match s.strip_prefix("function:") {
                Some(ret) => Ok(Ty::Function(Box::new(ret.parse()?))),
                None => Err(format!("unknown type '{}'", s)),
            },
        }
    }
}

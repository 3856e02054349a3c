//! Semantic types of Crux. These are computed by the type checker and attached
//! to every expression and symbol before the tree reaches lowering.

use std::rc::Rc;

use itertools::Itertools;

/// Size in bytes of every scalar storage slot (ints and bools alike)
pub const SCALAR_WIDTH: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// int
    Int,
    /// bool
    Bool,
    /// void
    ///
    /// Only valid as the return type of a function
    Void,
    /// int[16]
    ///
    /// A fixed size, globally allocated run of scalars
    Array { base: Rc<Type>, extent: u64 },
    /// func(int, bool): int
    Function {
        parameters: Rc<[Type]>,
        return_type: Rc<Type>,
    },
}

impl Type {
    pub fn array(base: Type, extent: u64) -> Self {
        Self::Array {
            base: Rc::new(base),
            extent,
        }
    }

    pub fn function(parameters: impl IntoIterator<Item = Type>, return_type: Type) -> Self {
        Self::Function {
            parameters: parameters.into_iter().collect(),
            return_type: Rc::new(return_type),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Int | Self::Bool)
    }

    /// The return type of a function type, or `None` for every other type
    pub fn return_type(&self) -> Option<&Type> {
        match self {
            Self::Function { return_type, .. } => Some(return_type),
            _ => None,
        }
    }

    /// Number of scalar elements a global of this type occupies
    pub fn element_count(&self) -> u64 {
        match self {
            Self::Array { extent, .. } => *extent,
            _ => 1,
        }
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::Void => write!(f, "void"),
            Type::Array { base, extent } => write!(f, "{base}[{extent}]"),
            Type::Function {
                parameters,
                return_type,
            } => write!(
                f,
                "func({}): {return_type}",
                parameters.iter().map(|p| p.to_string()).join(", ")
            ),
        }
    }
}

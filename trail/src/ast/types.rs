//! Type AST nodes

use serde::{Deserialize, Serialize};

/// Declared type of a variable or parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// Boolean
    Bool,
    /// Text
    #[serde(rename = "string")]
    Str,
    /// Shared, mutable sequence
    List,
    /// The `none` value
    None,
    /// Take the type of the initializer (declarations only)
    Auto,
}

impl Type {
    /// Every type that owns a default value
    pub const CONCRETE: [Type; 6] = [
        Type::Int,
        Type::Float,
        Type::Bool,
        Type::Str,
        Type::List,
        Type::None,
    ];

    /// Parse a type keyword as written in source
    pub fn from_keyword(word: &str) -> Option<Type> {
        match word {
            "int" => Some(Type::Int),
            "float" => Some(Type::Float),
            "bool" => Some(Type::Bool),
            "string" => Some(Type::Str),
            "list" => Some(Type::List),
            "none" => Some(Type::None),
            "auto" => Some(Type::Auto),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Bool => "bool",
            Type::Str => "string",
            Type::List => "list",
            Type::None => "none",
            Type::Auto => "auto",
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_roundtrip() {
        for ty in Type::CONCRETE.into_iter().chain([Type::Auto]) {
            assert_eq!(Type::from_keyword(ty.keyword()), Some(ty));
        }
    }

    #[test]
    fn test_unknown_keyword() {
        assert_eq!(Type::from_keyword("i64"), None);
    }

    #[test]
    fn test_string_serializes_as_keyword() {
        assert_eq!(serde_json::to_string(&Type::Str).unwrap(), "\"string\"");
    }
}

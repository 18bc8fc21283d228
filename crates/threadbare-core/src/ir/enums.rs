use serde::{Deserialize, Serialize};

/// A user-declared enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub cases: Vec<EnumCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumCase {
    pub name: String,
    /// Lowered literal value, if one was written.
    pub value: Option<String>,
}

/// Emission strategy, fixed by the first case's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    /// No values: sequential `enum class`.
    Discriminant,
    /// Integer values: `enum class` with explicit discriminants.
    Integer,
    /// Anything else: a struct of `string_view` constants.
    StringConstants,
}

impl EnumDecl {
    pub fn kind(&self) -> EnumKind {
        match self.cases.first().and_then(|c| c.value.as_deref()) {
            None => EnumKind::Discriminant,
            Some(v) if v.parse::<i64>().is_ok() => EnumKind::Integer,
            Some(_) => EnumKind::StringConstants,
        }
    }

    pub fn has_case(&self, name: &str) -> bool {
        self.cases.iter().any(|c| c.name == name)
    }

    /// C++ reference to one of this enum's cases.
    pub fn member_ref(&self, case: &str) -> String {
        match self.kind() {
            EnumKind::StringConstants => format!("{}.{case}", self.name),
            EnumKind::Discriminant | EnumKind::Integer => format!("{}::{case}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(values: &[Option<&str>]) -> EnumDecl {
        EnumDecl {
            name: "Mood".into(),
            cases: values
                .iter()
                .enumerate()
                .map(|(i, v)| EnumCase {
                    name: format!("C{i}"),
                    value: v.map(str::to_string),
                })
                .collect(),
        }
    }

    #[test]
    fn kind_follows_first_case() {
        assert_eq!(decl(&[None, None]).kind(), EnumKind::Discriminant);
        assert_eq!(decl(&[Some("3"), Some("4")]).kind(), EnumKind::Integer);
        assert_eq!(decl(&[Some("\"a\"")]).kind(), EnumKind::StringConstants);
    }

    #[test]
    fn member_refs() {
        assert_eq!(decl(&[None]).member_ref("C0"), "Mood::C0");
        assert_eq!(decl(&[Some("\"a\"")]).member_ref("C0"), "Mood.C0");
    }
}

//! Compile-unit-wide registries and running maxima.
//!
//! One [`CompilationContext`] is threaded through every pass. Registries
//! only grow and smart variables only move from unresolved to resolved;
//! the context is read-only once emission starts.

use indexmap::{IndexMap, IndexSet};

use crate::error::CoreError;
use crate::ir::{EnumDecl, Tag};
use crate::pipeline::CodegenConfig;
use crate::syntax::Expr;

/// A variable declared as an expression over other variables.
#[derive(Debug, Clone)]
pub struct SmartVariable {
    pub name: String,
    pub dependencies: IndexSet<String>,
    pub expression: Expr,
}

/// Buffer capacities the generated header must provide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Maxima {
    pub options: usize,
    /// Tags on one line or option.
    pub tags: usize,
    /// Tag parameters on one line or option.
    pub tag_params: usize,
    pub node_tags: usize,
    pub node_tag_params: usize,
    /// Markup markers in one line.
    pub markups: usize,
    pub markup_params: usize,
}

#[derive(Debug, Default)]
pub struct CompilationContext {
    pub config: CodegenConfig,
    /// Function names of every node, group wrappers included.
    pub node_names: IndexSet<String>,
    /// Titles shared by node-group members.
    pub group_titles: IndexSet<String>,
    pub node_tags: IndexSet<String>,
    pub line_tags: IndexSet<String>,
    pub option_tags: IndexSet<String>,
    pub markup_names: IndexSet<String>,
    pub visited: IndexSet<String>,
    pub visit_counted: IndexSet<String>,
    pub once_keys: IndexSet<String>,
    /// Literal-initialized variables and their lowered initial values.
    pub variables: IndexMap<String, String>,
    pub unresolved: IndexMap<String, SmartVariable>,
    /// Resolved smart variables and their lowered text.
    pub resolved: IndexMap<String, String>,
    pub enums: Vec<EnumDecl>,
    pub maxima: Maxima,
    once_blocks: usize,
    generated_lines: usize,
}

impl CompilationContext {
    pub fn new(config: CodegenConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Allocate a once key for a `<<once>>` block or once-qualified option.
    pub fn register_once_block(&mut self) -> String {
        loop {
            let key = format!("once{}", self.once_blocks);
            self.once_blocks += 1;
            if self.once_keys.insert(key.clone()) {
                return key;
            }
        }
    }

    pub fn register_once_key(&mut self, key: &str) {
        self.once_keys.insert(key.to_string());
    }

    /// Line ID for a line without a `#line:` hashtag.
    pub fn next_line_id(&mut self) -> String {
        let id = format!("line{}", self.generated_lines);
        self.generated_lines += 1;
        id
    }

    pub fn is_smart_variable(&self, name: &str) -> bool {
        self.resolved.contains_key(name) || self.unresolved.contains_key(name)
    }

    /// Record the tags of one line or option.
    pub fn record_line_tags(&mut self, tags: &[Tag], option: bool) {
        let registry = if option {
            &mut self.option_tags
        } else {
            &mut self.line_tags
        };
        for tag in tags {
            registry.insert(tag.name.clone());
        }
        let params: usize = tags.iter().map(|t| t.params.len()).sum();
        self.maxima.tags = self.maxima.tags.max(tags.len());
        self.maxima.tag_params = self.maxima.tag_params.max(params);
    }

    /// Record the full tag list of one node.
    pub fn record_node_tags(&mut self, tags: &[Tag]) {
        for tag in tags {
            self.node_tags.insert(tag.name.clone());
        }
        let params: usize = tags.iter().map(|t| t.params.len()).sum();
        self.maxima.node_tags = self.maxima.node_tags.max(tags.len());
        self.maxima.node_tag_params = self.maxima.node_tag_params.max(params);
    }

    pub fn record_markup(&mut self, markups: usize, params: usize) {
        self.maxima.markups = self.maxima.markups.max(markups);
        self.maxima.markup_params = self.maxima.markup_params.max(params);
    }

    pub fn record_option_count(&mut self, count: usize) {
        self.maxima.options = self.maxima.options.max(count);
    }

    /// Line and option tag names, line tags first, without duplicates.
    pub fn all_line_tags(&self) -> IndexSet<&str> {
        self.line_tags
            .iter()
            .chain(self.option_tags.iter())
            .map(String::as_str)
            .collect()
    }

    /// Resolve `Enum.Case` or `.Case` to its C++ reference.
    pub fn enum_member_ref(&self, enum_name: Option<&str>, member: &str) -> Result<String, CoreError> {
        match enum_name {
            Some(name) => {
                let decl = self
                    .enums
                    .iter()
                    .find(|e| e.name == name && e.has_case(member))
                    .ok_or_else(|| CoreError::UnknownEnumMember(format!("{name}.{member}")))?;
                Ok(decl.member_ref(member))
            }
            None => {
                let matches: Vec<&EnumDecl> =
                    self.enums.iter().filter(|e| e.has_case(member)).collect();
                match matches.as_slice() {
                    [] => Err(CoreError::UnknownEnumMember(format!(".{member}"))),
                    [decl] => Ok(decl.member_ref(member)),
                    _ => Err(CoreError::AmbiguousEnumMember {
                        member: member.to_string(),
                        enums: matches.iter().map(|e| e.name.clone()).collect(),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{EnumCase, TagLocation};

    fn enum_decl(name: &str, cases: &[&str]) -> EnumDecl {
        EnumDecl {
            name: name.to_string(),
            cases: cases
                .iter()
                .map(|c| EnumCase {
                    name: c.to_string(),
                    value: None,
                })
                .collect(),
        }
    }

    #[test]
    fn once_blocks_are_sequential() {
        let mut ctx = CompilationContext::default();
        assert_eq!(ctx.register_once_block(), "once0");
        ctx.register_once_key("Start_once_0");
        assert_eq!(ctx.register_once_block(), "once1");
        assert_eq!(ctx.once_keys.len(), 3);
    }

    #[test]
    fn tag_maxima_are_per_line() {
        let mut ctx = CompilationContext::default();
        let a = Tag::parse(TagLocation::Line, "#pose:1,2").unwrap();
        let b = Tag::parse(TagLocation::Line, "#mood").unwrap();
        ctx.record_line_tags(&[a.clone(), b], false);
        ctx.record_line_tags(&[a], true);
        assert_eq!(ctx.maxima.tags, 2);
        assert_eq!(ctx.maxima.tag_params, 2);
        assert_eq!(
            ctx.all_line_tags().into_iter().collect::<Vec<_>>(),
            vec!["pose", "mood"]
        );
    }

    #[test]
    fn enum_members_resolve() {
        let mut ctx = CompilationContext::default();
        ctx.enums.push(enum_decl("Mood", &["Happy", "Sad"]));
        ctx.enums.push(enum_decl("Weather", &["Sunny", "Sad"]));
        assert_eq!(ctx.enum_member_ref(None, "Happy").unwrap(), "Mood::Happy");
        assert_eq!(ctx.enum_member_ref(Some("Weather"), "Sad").unwrap(), "Weather::Sad");
        assert!(matches!(
            ctx.enum_member_ref(None, "Sad"),
            Err(CoreError::AmbiguousEnumMember { .. })
        ));
        assert!(matches!(
            ctx.enum_member_ref(None, "Rainy"),
            Err(CoreError::UnknownEnumMember(_))
        ));
    }
}

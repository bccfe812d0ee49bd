//! Static tool registries keyed by closed enums.

use std::collections::HashSet;
use std::marker::PhantomData;

use super::schema::ToolDefinition;

/// A closed set of tools.
///
/// Each variant knows its wire name and definition. Lookup by name is the only
/// way untrusted input reaches a variant.
pub trait ToolKind: Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    /// Every variant, in listing order.
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn definition(self) -> ToolDefinition;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

/// Why a catalog could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate tool name '{0}'")]
    DuplicateName(String),

    #[error("tool '{tool}' requires undeclared parameter '{param}'")]
    UndeclaredRequired { tool: String, param: String },

    #[error("tool {kind} renders name '{rendered}'")]
    NameMismatch { kind: &'static str, rendered: String },
}

/// Immutable registry of tool definitions for one [`ToolKind`].
#[derive(Debug, Clone)]
pub struct ToolCatalog<K> {
    definitions: Vec<ToolDefinition>,
    _kind: PhantomData<K>,
}

impl<K: ToolKind> ToolCatalog<K> {
    /// Build and verify the catalog for `K`.
    pub fn try_new() -> Result<Self, CatalogError> {
        let definitions: Vec<ToolDefinition> = K::ALL.iter().map(|k| k.definition()).collect();
        Self::verify(K::ALL, &definitions)?;
        Ok(Self {
            definitions,
            _kind: PhantomData,
        })
    }

    /// Build the catalog for `K`.
    ///
    /// # Panics
    ///
    /// A malformed catalog is a programming error detected at startup.
    pub fn new() -> Self {
        Self::try_new().unwrap_or_else(|e| panic!("invalid tool catalog: {e}"))
    }

    fn verify(kinds: &[K], definitions: &[ToolDefinition]) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for (kind, def) in kinds.iter().zip(definitions) {
            if kind.name() != def.name {
                return Err(CatalogError::NameMismatch {
                    kind: kind.name(),
                    rendered: def.name.clone(),
                });
            }
            if !seen.insert(def.name.as_str()) {
                return Err(CatalogError::DuplicateName(def.name.clone()));
            }
            let schema = &def.input_schema;
            if let Some(param) = schema
                .required
                .iter()
                .find(|r| schema.properties.get(r).is_none())
            {
                return Err(CatalogError::UndeclaredRequired {
                    tool: def.name.clone(),
                    param: param.clone(),
                });
            }
        }
        Ok(())
    }

    /// All definitions in stable listing order.
    pub fn list(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Resolve a wire name to its variant and definition.
    pub fn resolve(&self, name: &str) -> Option<(K, &ToolDefinition)> {
        let kind = K::from_name(name)?;
        self.get(name).map(|def| (kind, def))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in `OpenAI` function-calling format.
    pub fn openai_tools_json(&self) -> Vec<serde_json::Value> {
        self.definitions
            .iter()
            .map(ToolDefinition::to_openai_json)
            .collect()
    }
}

impl<K: ToolKind> Default for ToolCatalog<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::schema::InputSchema;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Good {
        A,
        B,
    }

    impl ToolKind for Good {
        const ALL: &'static [Self] = &[Self::A, Self::B];

        fn name(self) -> &'static str {
            match self {
                Self::A => "a",
                Self::B => "b",
            }
        }

        fn definition(self) -> ToolDefinition {
            ToolDefinition::new(self.name(), "d", InputSchema::object().required("x", "X"))
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Duplicated {
        One,
        Two,
    }

    impl ToolKind for Duplicated {
        const ALL: &'static [Self] = &[Self::One, Self::Two];

        fn name(self) -> &'static str {
            "same"
        }

        fn definition(self) -> ToolDefinition {
            ToolDefinition::new("same", "d", InputSchema::object())
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Undeclared {
        Only,
    }

    impl ToolKind for Undeclared {
        const ALL: &'static [Self] = &[Self::Only];

        fn name(self) -> &'static str {
            "only"
        }

        fn definition(self) -> ToolDefinition {
            let mut schema = InputSchema::object();
            schema.required.push("ghost".into());
            ToolDefinition::new("only", "d", schema)
        }
    }

    #[test]
    fn lists_in_declaration_order() {
        let catalog = ToolCatalog::<Good>::new();
        let names: Vec<_> = catalog.list().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(catalog.resolve("b").map(|(k, _)| k), Some(Good::B));
        assert!(catalog.resolve("c").is_none());
        assert_eq!(catalog.openai_tools_json().len(), 2);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = ToolCatalog::<Duplicated>::try_new().unwrap_err();
        assert_eq!(err, CatalogError::DuplicateName("same".into()));
    }

    #[test]
    fn rejects_required_without_property() {
        let err = ToolCatalog::<Undeclared>::try_new().unwrap_err();
        assert!(matches!(err, CatalogError::UndeclaredRequired { ref param, .. } if param == "ghost"));
    }

    #[test]
    fn listing_is_stable_across_calls() {
        let catalog = ToolCatalog::<Good>::new();
        assert_eq!(catalog.list(), catalog.list());
    }
}

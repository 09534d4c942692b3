use crate::{
    action::{
        ActionDefinition, ExecutableAction, FailurePolicy,
        builtin::{
            CopyColumn, DeleteOnValue, ExtractDateTokens, LowerCase, SortColumn, UpperCase,
            cleanup::DELETE_ON_VALUE_ACTION_NAME,
            column::COPY_ACTION_NAME,
            date::EXTRACT_DATE_TOKENS_ACTION_NAME,
            order::SORT_ACTION_NAME,
            text::{LOWERCASE_ACTION_NAME, UPPERCASE_ACTION_NAME},
        },
    },
    date::DateParser,
    error::EngineError,
};
use std::{collections::BTreeMap, sync::Arc};

///
/// ResolvedAction
///
/// Outcome of resolving one action definition: the executable form plus
/// the definition it came from and its failure classification.
///

#[derive(Debug)]
pub struct ResolvedAction {
    pub definition: ActionDefinition,
    pub executable: ExecutableAction,
    pub failure_policy: FailurePolicy,
}

impl ResolvedAction {
    #[must_use]
    pub fn row(
        definition: &ActionDefinition,
        action: impl crate::action::RowAction + 'static,
    ) -> Self {
        Self {
            definition: definition.clone(),
            executable: ExecutableAction::Row(Box::new(action)),
            failure_policy: FailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn dataset(
        definition: &ActionDefinition,
        action: impl crate::action::DatasetAction + 'static,
    ) -> Self {
        Self {
            definition: definition.clone(),
            executable: ExecutableAction::Dataset(Box::new(action)),
            failure_policy: FailurePolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

type ActionBuilder = Box<dyn Fn(&ActionDefinition) -> Result<ResolvedAction, EngineError> + Send + Sync>;

///
/// ActionRegistry
///
/// Resolves action names to executable instances at pipeline-build time.
/// The pipeline never dispatches by name per row; unknown names fail the
/// build with a not-found error.
///

#[derive(Default)]
pub struct ActionRegistry {
    builders: BTreeMap<String, ActionBuilder>,
}

impl ActionRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry preloaded with the builtin action set.
    #[must_use]
    pub fn builtin(date_parser: Arc<dyn DateParser>) -> Self {
        let mut registry = Self::empty();

        registry.register(UPPERCASE_ACTION_NAME, |definition| {
            Ok(ResolvedAction::row(definition, UpperCase))
        });
        registry.register(LOWERCASE_ACTION_NAME, |definition| {
            Ok(ResolvedAction::row(definition, LowerCase))
        });
        registry.register(COPY_ACTION_NAME, |definition| {
            Ok(ResolvedAction::row(definition, CopyColumn))
        });
        registry.register(DELETE_ON_VALUE_ACTION_NAME, |definition| {
            Ok(ResolvedAction::row(definition, DeleteOnValue))
        });
        registry.register(EXTRACT_DATE_TOKENS_ACTION_NAME, move |definition| {
            Ok(ResolvedAction::row(
                definition,
                ExtractDateTokens::new(Arc::clone(&date_parser)),
            ))
        });
        registry.register(SORT_ACTION_NAME, |definition| {
            Ok(ResolvedAction::dataset(
                definition,
                SortColumn::from_definition(definition)?,
            ))
        });

        registry
    }

    /// Register (or replace) a named action builder.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        builder: impl Fn(&ActionDefinition) -> Result<ResolvedAction, EngineError> + Send + Sync + 'static,
    ) {
        self.builders.insert(name.into(), Box::new(builder));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Resolve one definition into its executable form.
    pub fn resolve(&self, definition: &ActionDefinition) -> Result<ResolvedAction, EngineError> {
        let builder = self
            .builders
            .get(&definition.name)
            .ok_or_else(|| EngineError::unknown_action(&definition.name))?;

        builder(definition)
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{action::params, date::PatternDateParser};

    fn registry() -> ActionRegistry {
        ActionRegistry::builtin(Arc::new(PatternDateParser::default()))
    }

    #[test]
    fn builtin_names_resolve() {
        let registry = registry();
        for name in [
            "uppercase",
            "lowercase",
            "copy",
            "delete_on_value",
            "extract_date_tokens",
            "sort",
        ] {
            assert!(registry.contains(name), "missing builtin: {name}");
        }
    }

    #[test]
    fn unknown_action_is_not_found_at_build_time() {
        let err = registry()
            .resolve(&ActionDefinition::new("no_such_action"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn sort_resolves_to_a_dataset_action() {
        let resolved = registry()
            .resolve(&ActionDefinition::new("sort").with_param(params::COLUMN_ID, "0000"))
            .unwrap();
        assert!(matches!(resolved.executable, ExecutableAction::Dataset(_)));
    }
}

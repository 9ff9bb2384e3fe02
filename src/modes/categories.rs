use crate::errors::{ConfigError, ConfigResult, ResolutionError, ResolutionResult};
use schema::{CategoryDef, CategoryKind};
use std::collections::BTreeMap;

/// Categories declared by one gimmick, keyed by kind.
pub type Categories = BTreeMap<CategoryKind, Category>;

/// A typed gimmick category.
#[derive(Debug, Clone, PartialEq)]
pub enum Category {
    /// Input, team and battle changes. The tags are exported with the match.
    Tagged { tags: Vec<String> },
    /// Species, ability, move and item replacement pools.
    Pool(PoolCategory),
    /// Pokemon theme restrictions on the sets that may be drawn.
    Theme {
        any_tags: Vec<String>,
        all_tags: Vec<String>,
    },
}

/// A replacement pool. `pool` is `None` when the category draws from every
/// known entry, narrowed only by the whitelist and blacklist.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolCategory {
    pub pool: Option<Vec<String>>,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
    pub one_per_match: bool,
}

impl PoolCategory {
    fn new(def: &CategoryDef) -> Self {
        let pool = if def.pool.is_empty() {
            None
        } else {
            Some(
                def.pool
                    .iter()
                    .filter(|item| !def.pool_blacklist.contains(item))
                    .filter(|item| {
                        def.pool_whitelist.is_empty() || def.pool_whitelist.contains(item)
                    })
                    .cloned()
                    .collect(),
            )
        };
        Self {
            pool,
            whitelist: def.pool_whitelist.clone(),
            blacklist: def.pool_blacklist.clone(),
            one_per_match: def.one_per_match,
        }
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, item: &str) -> bool {
        let matches = |entry: &String| entry.eq_ignore_ascii_case(item);
        match &self.pool {
            Some(pool) => pool.iter().any(matches),
            None => {
                !self.blacklist.iter().any(matches)
                    && (self.whitelist.is_empty() || self.whitelist.iter().any(matches))
            }
        }
    }
}

impl Category {
    /// Builds a category of the given kind from its definition.
    pub fn from_def(gimmick_id: &str, kind: CategoryKind, def: &CategoryDef) -> ConfigResult<Self> {
        if kind.is_tagged() {
            let tags = match &def.tag {
                Some(tag) => vec![tag.clone()],
                None => def.tags.clone(),
            };
            if tags.is_empty() {
                return Err(ConfigError::InvalidCategory {
                    id: gimmick_id.to_string(),
                    kind,
                    reason: "expected `tag` or `tags`".to_string(),
                });
            }
            return Ok(Category::Tagged { tags });
        }

        match kind {
            CategoryKind::PokemonTheme => Ok(Category::Theme {
                any_tags: def.any_tags.clone(),
                all_tags: def.all_tags.clone(),
            }),
            _ => Ok(Category::Pool(PoolCategory::new(def))),
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Category::Tagged { tags } => tags,
            _ => &[],
        }
    }

    pub fn as_pool(&self) -> Option<&PoolCategory> {
        match self {
            Category::Pool(pool) => Some(pool),
            _ => None,
        }
    }
}

/// Parses every category of one gimmick definition.
pub fn categories_from_defs(
    gimmick_id: &str,
    defs: &BTreeMap<CategoryKind, CategoryDef>,
) -> ConfigResult<Categories> {
    defs.iter()
        .map(|(kind, def)| Ok((*kind, Category::from_def(gimmick_id, *kind, def)?)))
        .collect()
}

/// Whether two gimmicks declare the same non-mergeable category.
pub fn categories_conflict(a: &Categories, b: &Categories) -> bool {
    a.keys()
        .any(|kind| !kind.is_mergeable() && b.contains_key(kind))
}

/// Merges the categories of the base gimmicks in a combination. Mergeable
/// categories concatenate their tags; any other duplicate kind is an error.
pub fn merge_categories<'a, I>(sources: I) -> ResolutionResult<Categories>
where
    I: IntoIterator<Item = &'a Categories>,
{
    let mut merged = Categories::new();
    for categories in sources {
        for (kind, category) in categories {
            match merged.get_mut(kind) {
                None => {
                    merged.insert(*kind, category.clone());
                }
                Some(Category::Tagged { tags }) if kind.is_mergeable() => {
                    tags.extend(category.tags().iter().cloned());
                }
                Some(_) => return Err(ResolutionError::CategoryMerge(*kind)),
            }
        }
    }
    Ok(merged)
}

/// The tags of every tagged category, in kind order.
pub fn category_tags(categories: &Categories) -> Vec<String> {
    categories
        .values()
        .flat_map(|category| category.tags().iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tagged(tag: &str) -> CategoryDef {
        CategoryDef {
            tag: Some(tag.to_string()),
            ..Default::default()
        }
    }

    fn single(kind: CategoryKind, def: CategoryDef) -> Categories {
        categories_from_defs("test", &BTreeMap::from([(kind, def)])).unwrap()
    }

    #[test]
    fn test_tagged_category_requires_a_tag() {
        let result = Category::from_def("speed", CategoryKind::BattleChange, &CategoryDef::default());
        assert!(matches!(
            result,
            Err(ConfigError::InvalidCategory {
                kind: CategoryKind::BattleChange,
                ..
            })
        ));
    }

    #[test]
    fn test_mergeable_categories_concatenate_tags() {
        let a = single(CategoryKind::BattleChange, tagged("speed"));
        let b = single(CategoryKind::BattleChange, tagged("inverse"));
        let merged = merge_categories([&a, &b]).unwrap();
        assert_eq!(category_tags(&merged), vec!["speed", "inverse"]);
        assert!(!categories_conflict(&a, &b));
    }

    #[test]
    fn test_other_duplicates_do_not_merge() {
        let a = single(CategoryKind::InputChange, tagged("random_moves"));
        let b = single(CategoryKind::InputChange, tagged("defiance"));
        assert!(categories_conflict(&a, &b));
        assert_eq!(
            merge_categories([&a, &b]),
            Err(ResolutionError::CategoryMerge(CategoryKind::InputChange))
        );
    }

    #[test]
    fn test_pool_membership_is_case_insensitive() {
        let explicit = PoolCategory::new(&CategoryDef {
            pool: vec!["Ditto".into(), "Mew".into(), "Smeargle".into()],
            pool_blacklist: vec!["Mew".into()],
            ..Default::default()
        });
        assert!(explicit.contains("ditto"));
        assert!(!explicit.contains("mew"));
        assert!(!explicit.contains("Pikachu"));

        let open = PoolCategory::new(&CategoryDef {
            pool_blacklist: vec!["Arceus".into()],
            ..Default::default()
        });
        assert!(open.contains("Pikachu"));
        assert!(!open.contains("ARCEUS"));
    }
}

//! Ad-slot definitions and filter merging.

use crate::domain::error::DomainError;
use crate::domain::query::ContentQuery;

/// A named placement and the static filters that restrict what may fill it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDefinition {
    pub name: String,
    pub label: String,
    pub filters: ContentQuery,
    /// Name of the renderer that produces slot markup, if any.
    pub renderer: Option<String>,
}

impl SlotDefinition {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        filters: ContentQuery,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        validate_slot_name(&name)?;
        let label = label.into();
        let label = if label.trim().is_empty() {
            name.clone()
        } else {
            label
        };
        Ok(Self {
            name,
            label,
            filters,
            renderer: None,
        })
    }

    pub fn with_renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = Some(renderer.into());
        self
    }
}

/// Slot names end up in metadata keys and URLs, so keep them to `[a-z0-9_-]`.
pub fn validate_slot_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::EmptySlotName);
    }
    if !name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        return Err(DomainError::InvalidSlotName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// The set of active slots for a deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotCatalog {
    slots: Vec<SlotDefinition>,
}

impl SlotCatalog {
    pub fn new(slots: Vec<SlotDefinition>) -> Result<Self, DomainError> {
        for (index, slot) in slots.iter().enumerate() {
            if slots[..index].iter().any(|other| other.name == slot.name) {
                return Err(DomainError::DuplicateSlot {
                    slot: slot.name.clone(),
                });
            }
        }
        Ok(Self { slots })
    }

    pub fn get(&self, name: &str) -> Option<&SlotDefinition> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotDefinition> {
        self.slots.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Fold caller overrides into a base filter set.
///
/// List-valued clauses are appended (skipping duplicates) so overrides narrow or
/// widen the slot defaults without discarding them; `limit` is replaced and
/// `exclude_sticky` can only be switched on.
pub fn augment(base: &mut ContentQuery, overrides: &ContentQuery) {
    append_unique(&mut base.content_types, &overrides.content_types);
    append_unique(&mut base.statuses, &overrides.statuses);
    append_unique(&mut base.ids, &overrides.ids);
    append_unique(&mut base.campaigns, &overrides.campaigns);
    append_unique(&mut base.meta, &overrides.meta);
    append_unique(&mut base.exclude_terms, &overrides.exclude_terms);
    base.exclude_sticky |= overrides.exclude_sticky;
    if overrides.limit.is_some() {
        base.limit = overrides.limit;
    }
}

fn append_unique<T: Clone + PartialEq>(target: &mut Vec<T>, extra: &[T]) {
    for value in extra {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}

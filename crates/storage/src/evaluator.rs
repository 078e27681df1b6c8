//! In-memory query evaluation
//!
//! Implements the subset of backend query semantics the memory backend needs:
//!
//! - kind and namespace scoping
//! - property comparisons; a repeated property matches when any element
//!   matches, and each condition of a conjunction is checked on its own, so
//!   distinct elements may satisfy distinct conditions
//! - comparisons only match values of the same type
//! - ancestor constraints match any prefix of the key path, including the
//!   full key itself
//! - ordering: ascending uses a repeated property's smallest element,
//!   descending its largest; entities lacking an ordered property are
//!   excluded; ties keep candidate (insertion) order
//! - unordered queries return key order
//! - dotted names reach into embedded entities

use std::cmp::Ordering;

use entitymap_core::{Entity, Properties, Property, Value};

use crate::query::{Direction, Filter, PropertyOrder, Query, KEY_PROPERTY};

/// Evaluate `query` over candidates given in insertion order
pub fn evaluate(
    candidates: impl IntoIterator<Item = Entity>,
    query: &Query,
    enforce_indexes: bool,
) -> Vec<Entity> {
    let mut results: Vec<Entity> = candidates
        .into_iter()
        .filter(|e| in_scope(e, query))
        .filter(|e| match &query.filter {
            Some(filter) => matches(e, filter, enforce_indexes),
            None => true,
        })
        .collect();

    if query.order.is_empty() {
        results.sort_by(|a, b| a.key().cmp(b.key()));
    } else {
        results.retain(|e| {
            query
                .order
                .iter()
                .all(|o| sort_value(e, o, enforce_indexes).is_some())
        });
        // sort_by is stable: equal elements keep insertion order
        results.sort_by(|a, b| compare_for_order(a, b, &query.order, enforce_indexes));
    }

    results
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect()
}

fn in_scope(entity: &Entity, query: &Query) -> bool {
    entity.key().kind() == query.kind && entity.key().namespace() == query.namespace.as_deref()
}

/// Does `entity` satisfy `filter`?
pub fn matches(entity: &Entity, filter: &Filter, enforce_indexes: bool) -> bool {
    match filter {
        Filter::And(parts) => parts.iter().all(|f| matches(entity, f, enforce_indexes)),
        Filter::HasAncestor(ancestor) => entity.key().has_ancestor(ancestor),
        Filter::Property {
            property,
            op,
            value,
        } => match lookup(entity, property, enforce_indexes) {
            Some(stored) => elements(&stored).any(|element| {
                element.type_name() == value.type_name()
                    && op.accepts(element.canonical_cmp(value))
            }),
            None => false,
        },
    }
}

fn lookup(entity: &Entity, property: &str, enforce_indexes: bool) -> Option<Value> {
    if property == KEY_PROPERTY {
        return Some(Value::Key(entity.key().clone()));
    }
    lookup_path(entity.properties(), property, enforce_indexes)
}

/// Resolve a dotted name, descending into embedded entities when the name
/// is not stored flat
fn lookup_path(properties: &Properties, path: &str, enforce_indexes: bool) -> Option<Value> {
    if let Some(prop) = properties.get(path) {
        if enforce_indexes && !prop.indexed {
            return None;
        }
        return Some(prop.value.clone());
    }
    for (i, _) in path.match_indices('.') {
        if let Some(Property {
            value: Value::Entity(inner),
            indexed,
        }) = properties.get(&path[..i])
        {
            if enforce_indexes && !indexed {
                return None;
            }
            if let Some(found) = lookup_path(inner, &path[i + 1..], enforce_indexes) {
                return Some(found);
            }
        }
    }
    None
}

fn elements(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        single => Box::new(std::iter::once(single)),
    }
}

fn sort_value(entity: &Entity, order: &PropertyOrder, enforce_indexes: bool) -> Option<Value> {
    let stored = lookup(entity, &order.property, enforce_indexes)?;
    let pick = elements(&stored).fold(None::<&Value>, |best, v| match best {
        None => Some(v),
        Some(b) => {
            let better = match order.direction {
                Direction::Ascending => v.canonical_cmp(b) == Ordering::Less,
                Direction::Descending => v.canonical_cmp(b) == Ordering::Greater,
            };
            Some(if better { v } else { b })
        }
    });
    pick.cloned()
}

fn compare_for_order(
    a: &Entity,
    b: &Entity,
    orders: &[PropertyOrder],
    enforce_indexes: bool,
) -> Ordering {
    for order in orders {
        let (Some(va), Some(vb)) = (
            sort_value(a, order, enforce_indexes),
            sort_value(b, order, enforce_indexes),
        ) else {
            continue;
        };
        let ord = match order.direction {
            Direction::Ascending => va.canonical_cmp(&vb),
            Direction::Descending => vb.canonical_cmp(&va),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

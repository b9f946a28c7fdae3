//! Capability filtering: tool allow-lists, parameter hiding, and
//! annotation suppression.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::catalog::ToolDescriptor;

/// Restricts which tools and parameters a caller may see.
///
/// Immutable for the lifetime of one orchestrator instance; building a
/// new policy and a new orchestrator is the way to change it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapabilityPolicy {
    /// Tools callers may use. `None` allows every tool in the catalog.
    pub allowed_tools: Option<BTreeSet<String>>,
    /// Parameter names stripped from every exposed schema.
    pub hidden_params: BTreeSet<String>,
    /// Whether to drop book- and chapter-level annotation entries from
    /// raw tool results.
    pub suppress_broad_annotations: bool,
}

impl CapabilityPolicy {
    /// Whether `name` passes the allow-list.
    ///
    /// Checked again immediately before invocation: the model, or a
    /// hostile caller, can name a disabled tool directly, so filtering
    /// the advertised catalog alone is not enough.
    pub fn is_allowed(&self, name: &str) -> bool {
        match &self.allowed_tools {
            None => true,
            Some(allowed) => allowed.contains(name),
        }
    }
}

/// Returns the subset of `catalog` the policy exposes, in catalog order,
/// with hidden parameters removed from each schema.
pub fn restrict(
    catalog: &[ToolDescriptor],
    policy: &CapabilityPolicy,
) -> Vec<ToolDescriptor> {
    catalog
        .iter()
        .filter(|descriptor| policy.is_allowed(&descriptor.name))
        .map(|descriptor| {
            let mut descriptor = descriptor.clone();
            hide_params(&mut descriptor.input_schema, &policy.hidden_params);
            descriptor
        })
        .collect()
}

fn hide_params(schema: &mut Value, hidden: &BTreeSet<String>) {
    if hidden.is_empty() {
        return;
    }
    let Some(schema) = schema.as_object_mut() else {
        return;
    };
    if let Some(properties) =
        schema.get_mut("properties").and_then(Value::as_object_mut)
    {
        for name in hidden {
            properties.remove(name);
        }
    }
    // A name can appear in `required` without a matching property; it is
    // removed from `required` regardless.
    if let Some(required) =
        schema.get_mut("required").and_then(Value::as_array_mut)
    {
        required.retain(|name| match name.as_str() {
            Some(name) => !hidden.contains(name),
            None => true,
        });
    }
}

/// Drops entries of the payload's `items` array matched by `predicate`
/// and recomputes total-count metadata to the filtered length.
///
/// This must run on the raw structured payload, before any textual
/// flattening: the entries being removed are only identifiable while the
/// data is still structured. Payloads without an `items` array pass
/// through untouched.
pub fn suppress_annotations<F>(mut raw: Value, predicate: F) -> Value
where
    F: Fn(&Value) -> bool,
{
    let Some(root) = raw.as_object_mut() else {
        return raw;
    };
    let Some(items) = root.get_mut("items").and_then(Value::as_array_mut)
    else {
        return raw;
    };

    items.retain(|item| !predicate(item));
    let count = items.len();

    for key in ["total", "totalCount"] {
        if root.contains_key(key) {
            root.insert(key.to_owned(), count.into());
        }
    }
    if let Some(metadata) =
        root.get_mut("metadata").and_then(Value::as_object_mut)
    {
        for key in ["total", "totalCount"] {
            if metadata.contains_key(key) {
                metadata.insert(key.to_owned(), count.into());
            }
        }
    }
    raw
}

/// Whether an annotation item points at a whole book or chapter rather
/// than a verse-level reference.
///
/// Point references have three dot-separated segments (`JHN.3.16`);
/// book- (`JHN`) and chapter-level (`JHN.3`) references have fewer.
/// Items without a reference string are kept.
pub fn is_broad_annotation(item: &Value) -> bool {
    let Some(reference) = item.get("reference").and_then(Value::as_str)
    else {
        return false;
    };
    reference.split('.').count() < 3
}

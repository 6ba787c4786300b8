//! Merge of duplicate declarations.
//!
//! Pure functions of `(existing node, incoming node) -> node`. The earlier
//! declaration wins for everything that is not a set: comment, signature,
//! superclass. Sets (declaration sites, protocols, attributes, children) are
//! unioned.

use crate::model::{Node, NodeKey, SignatureFragment};
use std::collections::BTreeMap;

/// Merge result plus a description of every disagreement found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub node: Node,
    pub conflicts: Vec<String>,
}

pub fn merge_nodes(existing: Node, incoming: Node) -> Merged {
    let mut conflicts = Vec::new();
    let mut node = existing;
    let Node {
        location,
        declared_in,
        comment,
        signature,
        type_name,
        superclass,
        protocols,
        base_class,
        attributes,
        group,
        resolution,
        parent,
        children,
        ..
    } = incoming;

    node.declared_in.extend(declared_in);
    if location < node.location {
        node.location = location;
    }

    // first non-empty comment in processing order
    if !node.is_documented() && comment.as_ref().is_some_and(|c| !c.is_empty()) {
        node.comment = comment;
    } else if node.comment.is_none() {
        node.comment = comment;
    }

    if node.signature.is_empty() {
        node.signature = signature;
    } else if !signature.is_empty() && !same_signature(&node.signature, &signature) {
        conflicts.push(format!(
            "conflicting signatures for {}",
            node.display_name()
        ));
    }

    if node.type_name.is_none() {
        node.type_name = type_name;
    } else if let (Some(current), Some(incoming)) = (&node.type_name, &type_name) {
        if squash(current) != squash(incoming) {
            conflicts.push(format!(
                "conflicting types for {}: {} vs {}",
                node.display_name(),
                current,
                incoming
            ));
        }
    }

    if node.superclass.is_none() {
        node.superclass = superclass;
    } else if let (Some(current), Some(incoming)) = (&node.superclass, &superclass) {
        if current != incoming {
            conflicts.push(format!(
                "{} declared with superclass {} and {}",
                node.name, current, incoming
            ));
        }
    }

    node.protocols.extend(protocols);
    for attribute in attributes {
        if !node.attributes.contains(&attribute) {
            node.attributes.push(attribute);
        }
    }
    node.base_class = node.base_class.take().or(base_class);
    node.group = node.group.take().or(group);
    node.resolution = node.resolution.or(resolution);
    node.parent = node.parent.take().or(parent);

    for child in children.into_values() {
        conflicts.extend(insert_or_merge(&mut node.children, child));
    }

    Merged { node, conflicts }
}

/// Insert `node` under its key, merging into an existing sibling.
/// Returns the conflicts the merge found.
pub fn insert_or_merge(siblings: &mut BTreeMap<NodeKey, Node>, node: Node) -> Vec<String> {
    let key = node.key();
    match siblings.remove(&key) {
        Some(existing) => {
            let merged = merge_nodes(existing, node);
            siblings.insert(key, merged.node);
            merged.conflicts
        }
        None => {
            siblings.insert(key, node);
            Vec::new()
        }
    }
}

/// Signatures agree when types and selector keywords agree; parameter names may differ.
fn same_signature(a: &[SignatureFragment], b: &[SignatureFragment]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (
                SignatureFragment::Return { type_name: x },
                SignatureFragment::Return { type_name: y },
            ) => squash(x) == squash(y),
            (
                SignatureFragment::Parameter {
                    keyword: k1,
                    type_name: t1,
                    ..
                },
                SignatureFragment::Parameter {
                    keyword: k2,
                    type_name: t2,
                    ..
                },
            ) => k1 == k2 && squash(t1) == squash(t2),
            (SignatureFragment::Variadic, SignatureFragment::Variadic) => true,
            _ => false,
        })
}

fn squash(type_name: &str) -> String {
    type_name.chars().filter(|c| !c.is_whitespace()).collect()
}

//! Annotation tree built from dotted annotation keys
//!
//! `com.lightbend.test = 123` becomes `com { lightbend { test = 123 } }`.
//! A key never holds both a scalar and a group: whichever is written last
//! replaces the other.

use log::debug;

use super::conf::{ConfObject, ConfValue};
use crate::oci::AnnotationValue;

/// Set `value` at the dotted path `key`, creating groups along the way
pub fn insert_dotted(tree: &mut ConfObject, key: &str, value: ConfValue) {
    let mut segments: Vec<&str> = key.split('.').collect();
    let leaf = segments.pop().unwrap_or(key);

    let mut node = tree;
    for segment in segments {
        let is_group = matches!(node.get(segment), Some(ConfValue::Object(_)));
        if !is_group {
            if node.get(segment).is_some() {
                debug!("Annotation '{key}' replaces scalar at '{segment}' with a group");
            }
            node.insert(segment, ConfObject::new());
        }
        node = match node.get_mut(segment) {
            Some(ConfValue::Object(child)) => child,
            _ => return,
        };
    }
    node.insert(leaf, value);
}

/// Build the annotation tree: manifest annotations first, then the caller's
pub fn annotation_tree(
    manifest: &[(String, AnnotationValue)],
    caller: &[(String, AnnotationValue)],
) -> ConfObject {
    let mut tree = ConfObject::new();
    for (key, value) in manifest.iter().chain(caller) {
        insert_dotted(&mut tree, key, ConfValue::from(value.clone()));
    }
    tree
}

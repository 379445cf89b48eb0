//! The declarative attribute-to-structure mapping engine.
//!
//! Every format converter in this crate is driven by a [`MapSpec`]: a tree
//! whose leaves name source attributes or carry literal values, and whose
//! nodes mirror the shape of the output payload. Mapping a spec against a
//! flat attribute bag produces a [`Mapped`] tree of the same shape, with
//! leaves resolved and absent attributes silently omitted. The engine knows
//! nothing about XML or JSON; the converters lower the mapped tree into
//! their own wire format.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// A declarative mapping specification.
///
/// Output keys prefixed with `@` denote attributes of the enclosing node in
/// tree formats that distinguish node attributes from child elements.
#[derive(Debug, Clone, PartialEq)]
pub enum MapSpec {
    /// Pull the value of a source attribute; omitted when absent.
    Attr(String),
    /// A fixed value, emitted regardless of input.
    Literal(String),
    /// A nested node with ordered children. Emitted even when every child
    /// resolved to nothing, so converters can inject attributes afterwards.
    Node(Vec<(String, MapSpec)>),
    /// A sequence of sibling nodes built from sub-specs. When the flag is
    /// set, entries that pulled nothing from the input are dropped.
    Repeat(Vec<MapSpec>, bool),
}

impl MapSpec {
    pub fn attr(source: impl Into<String>) -> Self {
        MapSpec::Attr(source.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        MapSpec::Literal(value.into())
    }

    pub fn node<K: Into<String>>(children: Vec<(K, MapSpec)>) -> Self {
        MapSpec::Node(
            children
                .into_iter()
                .map(|(key, spec)| (key.into(), spec))
                .collect(),
        )
    }

    /// Appends a child to a `Node` spec. No-op on leaf specs.
    pub fn push_child(&mut self, key: impl Into<String>, spec: MapSpec) {
        if let MapSpec::Node(children) = self {
            children.push((key.into(), spec));
        }
    }

    /// Whether any `Attr` leaf in this spec resolves against the attributes.
    fn pulls_from(&self, attributes: &HashMap<String, String>) -> bool {
        match self {
            MapSpec::Attr(source) => attributes.contains_key(source),
            MapSpec::Literal(_) => false,
            MapSpec::Node(children) => children
                .iter()
                .any(|(_, child)| child.pulls_from(attributes)),
            MapSpec::Repeat(specs, _) => specs.iter().any(|spec| spec.pulls_from(attributes)),
        }
    }
}

/// The resolved output tree of a mapping pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped {
    Text(String),
    Node(Vec<(String, Mapped)>),
    List(Vec<Mapped>),
}

impl Mapped {
    /// Lowers the mapped tree to a JSON value. `@`-prefixed keys have no
    /// special meaning in JSON and are kept as ordinary object keys.
    pub fn into_json(self) -> Value {
        match self {
            Mapped::Text(text) => Value::String(text),
            Mapped::Node(children) => {
                let mut object = Map::new();
                for (key, child) in children {
                    object.insert(key, child.into_json());
                }
                Value::Object(object)
            }
            Mapped::List(items) => Value::Array(items.into_iter().map(Mapped::into_json).collect()),
        }
    }
}

/// Maps a spec against a flat attribute bag.
///
/// Returns `None` only for leaves whose source attribute is absent and for
/// repeats that produced nothing; nodes always map to a node so that
/// structure the converters rely on is preserved.
pub fn map_attributes(spec: &MapSpec, attributes: &HashMap<String, String>) -> Option<Mapped> {
    match spec {
        MapSpec::Attr(source) => attributes.get(source).cloned().map(Mapped::Text),
        MapSpec::Literal(value) => Some(Mapped::Text(value.clone())),
        MapSpec::Node(children) => {
            let mapped = children
                .iter()
                .filter_map(|(key, child)| {
                    map_attributes(child, attributes).map(|value| (key.clone(), value))
                })
                .collect();
            Some(Mapped::Node(mapped))
        }
        MapSpec::Repeat(specs, filter_empty) => {
            let items: Vec<Mapped> = specs
                .iter()
                .filter(|spec| !filter_empty || spec.pulls_from(attributes))
                .filter_map(|spec| map_attributes(spec, attributes))
                .collect();
            if items.is_empty() {
                None
            } else {
                Some(Mapped::List(items))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn attributes(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_attribute_is_omitted() {
        let spec = MapSpec::node(vec![
            ("A", MapSpec::attr("missing_attr")),
            ("B", MapSpec::attr("present_attr")),
        ]);
        let mapped = map_attributes(&spec, &attributes(&[("present_attr", "v")])).unwrap();
        assert_eq!(mapped.into_json(), json!({"B": "v"}));
    }

    #[test]
    fn test_literal_always_emitted() {
        let spec = MapSpec::node(vec![("TYPE", MapSpec::literal("Study"))]);
        let mapped = map_attributes(&spec, &HashMap::new()).unwrap();
        assert_eq!(mapped.into_json(), json!({"TYPE": "Study"}));
    }

    #[test]
    fn test_empty_node_is_preserved() {
        // Converters inject link attributes into empty nodes after mapping.
        let spec = MapSpec::node(vec![("STUDY_REF", MapSpec::Node(Vec::new()))]);
        let mapped = map_attributes(&spec, &HashMap::new()).unwrap();
        assert_eq!(mapped.into_json(), json!({"STUDY_REF": {}}));
    }

    #[test]
    fn test_repeat_filters_entries_without_input() {
        let spec = MapSpec::Repeat(
            vec![
                MapSpec::node(vec![
                    ("name", MapSpec::literal("Name")),
                    ("value", MapSpec::attr("study_name")),
                ]),
                MapSpec::node(vec![
                    ("name", MapSpec::literal("Release Date")),
                    ("value", MapSpec::attr("release_date")),
                ]),
            ],
            true,
        );
        let mapped = map_attributes(&spec, &attributes(&[("study_name", "cohort")])).unwrap();
        assert_eq!(
            mapped.into_json(),
            json!([{"name": "Name", "value": "cohort"}])
        );
    }

    #[test]
    fn test_repeat_without_filter_keeps_constant_entries() {
        let spec = MapSpec::Repeat(
            vec![MapSpec::node(vec![("name", MapSpec::literal("Tool"))])],
            false,
        );
        let mapped = map_attributes(&spec, &HashMap::new()).unwrap();
        assert_eq!(mapped.into_json(), json!([{"name": "Tool"}]));
    }

    #[test]
    fn test_empty_repeat_is_omitted() {
        let spec = MapSpec::node(vec![(
            "links",
            MapSpec::Repeat(
                vec![MapSpec::node(vec![("url", MapSpec::attr("study_accession"))])],
                true,
            ),
        )]);
        let mapped = map_attributes(&spec, &HashMap::new()).unwrap();
        assert_eq!(mapped.into_json(), json!({}));
    }

    #[test]
    fn test_nested_structure() {
        let spec = MapSpec::node(vec![
            ("@center_name", MapSpec::attr("center_name")),
            (
                "DESCRIPTOR",
                MapSpec::node(vec![
                    ("STUDY_TITLE", MapSpec::attr("study_name")),
                    ("STUDY_ABSTRACT", MapSpec::attr("abstract")),
                ]),
            ),
        ]);
        let mapped = map_attributes(
            &spec,
            &attributes(&[("center_name", "EBI"), ("study_name", "cohort")]),
        )
        .unwrap();
        assert_eq!(
            mapped.into_json(),
            json!({
                "@center_name": "EBI",
                "DESCRIPTOR": {"STUDY_TITLE": "cohort"}
            })
        );
    }
}

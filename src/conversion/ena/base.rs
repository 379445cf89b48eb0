//! Shared machinery for the ENA XML converters.
//!
//! Each ENA object converter pairs a declarative [`MapSpec`] with
//! format-specific pre/post processing. This module owns the pieces they all
//! share: the [`XmlElement`] tree and its quick-xml serializer, lowering of a
//! mapped tree into XML (with `@`-prefixed keys becoming real attributes),
//! alias/accession injection, link reference building, the free-form
//! `<*_ATTRIBUTES>` blocks and uploaded-file scanning.

use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::mapping::{map_attributes, MapSpec, Mapped};
use crate::submission::entity::Entity;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to write XML: {0}")]
    XmlWrite(String),
    #[error("Mapping produced no payload for {entity_type} {index}")]
    EmptyPayload { entity_type: String, index: String },
    #[error(transparent)]
    Graph(#[from] crate::submission::graph::GraphError),
}

/// A plain XML element tree, built up by converters and serialized once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((name.into(), value.into()));
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn add_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// Depth-first iteration over every descendant with the given name.
    pub fn descendants_named<'a>(&'a self, name: &'a str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &'a str, found: &mut Vec<&'a XmlElement>) {
        if self.name == name {
            found.push(self);
        }
        for child in &self.children {
            child.collect_named(name, found);
        }
    }

    /// Serializes the element as a standalone, indented XML document.
    pub fn to_document(&self) -> Result<String, ConversionError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|error| ConversionError::XmlWrite(error.to_string()))?;
        self.write(&mut writer)?;
        String::from_utf8(writer.into_inner())
            .map_err(|error| ConversionError::XmlWrite(error.to_string()))
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), ConversionError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (name, value) in &self.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }
        let result = if self.children.is_empty() && self.text.is_none() {
            writer.write_event(Event::Empty(start))
        } else {
            writer
                .write_event(Event::Start(start))
                .and_then(|_| match &self.text {
                    Some(text) => writer.write_event(Event::Text(BytesText::new(text))),
                    None => Ok(()),
                })
        };
        result.map_err(|error| ConversionError::XmlWrite(error.to_string()))?;
        if !self.children.is_empty() || self.text.is_some() {
            for child in &self.children {
                child.write(writer)?;
            }
            writer
                .write_event(Event::End(BytesStart::new(self.name.as_str()).to_end()))
                .map_err(|error| ConversionError::XmlWrite(error.to_string()))?;
        }
        Ok(())
    }
}

/// A converter for one ENA object type: a declarative spec plus the hook
/// points the object types differ in.
pub trait EnaConverter {
    /// The ENA object name, also the XML root tag (`PROJECT`, `SAMPLE`, ...).
    fn ena_type(&self) -> &'static str;

    /// Services whose accession may stand as this object's external
    /// reference, most canonical first.
    fn accession_priority(&self) -> &'static [&'static str];

    fn spec(&self) -> MapSpec;

    /// Attributes covered by the declarative spec, excluded from the
    /// free-form attributes block.
    fn excluded_attributes(&self) -> &'static [&'static str];

    /// Appends whatever the declarative spec cannot express.
    fn post_process(&self, _entity: &Entity, _element: &mut XmlElement) {}

    fn convert(&self, entity: &Entity) -> Result<XmlElement, ConversionError> {
        self.convert_with_spec(entity, self.spec())
    }

    /// The shared conversion flow: root element named after the ENA type,
    /// `alias` from the entity index, `accession` when a prioritized service
    /// has assigned one, then the mapped spec and the post hook.
    fn convert_with_spec(
        &self,
        entity: &Entity,
        spec: MapSpec,
    ) -> Result<XmlElement, ConversionError> {
        let mut root = XmlElement::new(self.ena_type());
        root.set_attribute("alias", entity.identifier().index.clone());
        if let Some(accession) = entity.get_first_accession(self.accession_priority()) {
            root.set_attribute("accession", accession);
        }
        match map_attributes(&spec, &entity.attributes) {
            Some(mapped) => lower_into(mapped, &mut root),
            None => {
                return Err(ConversionError::EmptyPayload {
                    entity_type: entity.identifier().entity_type.clone(),
                    index: entity.identifier().index.clone(),
                })
            }
        }
        self.post_process(entity, &mut root);
        Ok(root)
    }
}

/// Lowers a mapped tree into an XML element: `@key` children become
/// attributes, text becomes element text, lists fan out into repeated
/// sibling elements under the same tag.
fn lower_into(mapped: Mapped, element: &mut XmlElement) {
    match mapped {
        Mapped::Text(text) => {
            if !text.is_empty() {
                element.text = Some(text);
            }
        }
        Mapped::Node(children) => {
            for (key, child) in children {
                if let Some(attribute) = key.strip_prefix('@') {
                    if let Mapped::Text(value) = child {
                        element.set_attribute(attribute, value);
                    }
                } else if let Mapped::List(items) = child {
                    for item in items {
                        let mut repeated = XmlElement::new(key.clone());
                        lower_into(item, &mut repeated);
                        element.add_child(repeated);
                    }
                } else {
                    let mut nested = XmlElement::new(key);
                    lower_into(child, &mut nested);
                    element.add_child(nested);
                }
            }
        }
        Mapped::List(items) => {
            for item in items {
                let mut repeated = XmlElement::new(element.name.clone());
                lower_into(item, &mut repeated);
                element.add_child(repeated);
            }
        }
    }
}

/// Builds the reference node for a relationship slot: an `accession`
/// attribute when the linked entity already has one under the priority list,
/// a `refname` back to its alias otherwise.
pub fn link_reference(linked: &Entity, accession_priority: &[&str]) -> MapSpec {
    match linked.get_first_accession(accession_priority) {
        Some(accession) => MapSpec::node(vec![("@accession", MapSpec::literal(accession))]),
        None => MapSpec::node(vec![(
            "@refname",
            MapSpec::literal(linked.identifier().index.clone()),
        )]),
    }
}

/// Appends a `<{TYPE}_ATTRIBUTES>` block holding every attribute the
/// structured spec did not consume, as TAG/VALUE pairs in sorted key order.
pub fn append_attribute_block(
    entity: &Entity,
    element: &mut XmlElement,
    block_tag: &str,
    attribute_tag: &str,
    excluded: &[&str],
) {
    let mut keys: Vec<&String> = entity
        .attributes
        .keys()
        .filter(|key| !excluded.contains(&key.as_str()))
        .collect();
    if keys.is_empty() {
        return;
    }
    keys.sort();
    let mut block = XmlElement::new(block_tag);
    for key in keys {
        block.add_child(make_attribute(attribute_tag, key, &entity.attributes[key]));
    }
    element.add_child(block);
}

fn make_attribute(attribute_tag: &str, tag: &str, value: &str) -> XmlElement {
    let mut attribute = XmlElement::new(attribute_tag);
    let mut tag_element = XmlElement::new("TAG");
    tag_element.text = Some(tag.to_string());
    let mut value_element = XmlElement::new("VALUE");
    value_element.text = Some(value.to_string());
    attribute.add_child(tag_element);
    attribute.add_child(value_element);
    attribute
}

/// Scans `uploaded_file_{n}` attributes for increasing `n` until one is
/// missing, pairing each with its stated checksum when present.
pub fn uploaded_files(entity: &Entity) -> Vec<(String, Option<String>)> {
    let mut files = Vec::new();
    let mut file_number = 1;
    while let Some(file_name) = entity.attributes.get(&format!("uploaded_file_{file_number}")) {
        let checksum = entity
            .attributes
            .get(&format!("uploaded_file_{file_number}_checksum"))
            .cloned();
        files.push((file_name.clone(), checksum));
        file_number += 1;
    }
    files
}

/// ENA file type derived from the file name.
pub fn file_type(file_name: &str) -> Option<&'static str> {
    let lowered = file_name.to_lowercase();
    if lowered.contains(".bam") {
        Some("bam")
    } else if lowered.contains(".cram") {
        Some("cram")
    } else if lowered.contains(".fastq") {
        Some("fastq")
    } else {
        None
    }
}

//! Pull-based reader for the exchange format.

use super::{
    CodecError, IDENTIFIER_ATTRIBUTE, NAME_ATTRIBUTE, NODE_ELEMENT, PROPERTIES_ELEMENT,
    PROPERTY_ELEMENT, TYPE_ATTRIBUTE, VOCABULARY_ELEMENT,
};
use crate::glob::NameFilter;
use crate::model::node::{ImportedNode, NodeContent, NodeIdentity, NodeKind};
use crate::repo::taxonomy_repo::TaxonomyRepository;
use crate::service::progress::{ProgressEvent, ProgressSink};
use crate::service::taxonomy_service::TaxonomyService;
use log::{debug, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use uuid::Uuid;

/// One vocabulary written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedVocabulary {
    pub name: String,
    pub identity: NodeIdentity,
    pub created: usize,
    pub updated: usize,
}

/// What one import run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<ImportedVocabulary>,
    /// Vocabularies in the document rejected by the name filter.
    pub skipped: Vec<String>,
}

/// Imports matching vocabularies from the file at `path` into the default
/// subgraph.
pub fn import_from_file<R: TaxonomyRepository>(
    service: &TaxonomyService<R>,
    path: &Path,
    filter: &NameFilter,
    progress: &mut dyn ProgressSink,
) -> Result<ImportReport, CodecError> {
    let file = File::open(path).map_err(|source| CodecError::Io {
        path: Some(path.to_path_buf()),
        source,
    })?;
    let label = path.display().to_string();
    import_vocabularies(service, BufReader::new(file), filter, &label, progress)
}

/// Reads `input` as a token stream and imports every matching vocabulary,
/// anchored at the taxonomy root's default variant.
///
/// Each vocabulary is committed on its own; an error aborts the run and keeps
/// the vocabularies imported before it.
pub fn import_vocabularies<R: TaxonomyRepository, B: BufRead>(
    service: &TaxonomyService<R>,
    input: B,
    filter: &NameFilter,
    label: &str,
    progress: &mut dyn ProgressSink,
) -> Result<ImportReport, CodecError> {
    let root = service.root()?;
    let mut reader = Reader::from_reader(input);
    let mut report = ImportReport::default();
    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();

    loop {
        let opened = match reader.read_event_into(&mut buf)? {
            Event::Start(start) if is_element(&start, VOCABULARY_ELEMENT) => {
                Some((required_attribute(&start, NAME_ATTRIBUTE)?, true))
            }
            Event::Empty(start) if is_element(&start, VOCABULARY_ELEMENT) => {
                Some((required_attribute(&start, NAME_ATTRIBUTE)?, false))
            }
            Event::Eof => break,
            _ => None,
        };
        buf.clear();
        let Some((name, has_body)) = opened else {
            continue;
        };

        if !filter.matches(&name) {
            if has_body {
                reader.read_to_end_into(QName(VOCABULARY_ELEMENT.as_bytes()), &mut skip_buf)?;
                skip_buf.clear();
            }
            debug!("event=import_vocabulary module=codec status=skipped vocabulary={name}");
            report.skipped.push(name);
            continue;
        }
        if !has_body {
            return Err(CodecError::malformed(format!(
                "vocabulary `{name}` has no node"
            )));
        }

        let subtree = read_vocabulary(&mut reader, &name)?;
        let summary = service
            .repo()
            .import_subtree(root.identity, &subtree, &root.subgraph)?;

        info!(
            "event=import_vocabulary module=codec status=ok vocabulary={} nodes={} created={} updated={}",
            name,
            subtree.node_count(),
            summary.created,
            summary.updated
        );
        progress.emit(ProgressEvent::Imported {
            vocabulary: name.clone(),
            file: label.to_string(),
        });
        report.imported.push(ImportedVocabulary {
            name,
            identity: summary.identity,
            created: summary.created,
            updated: summary.updated,
        });
    }

    Ok(report)
}

/// Reads the body of one `<vocabulary>` element up to its closing tag.
fn read_vocabulary<B: BufRead>(
    reader: &mut Reader<B>,
    name: &str,
) -> Result<ImportedNode, CodecError> {
    let mut buf = Vec::new();
    let mut top: Option<ImportedNode> = None;

    loop {
        let node = match reader.read_event_into(&mut buf)? {
            Event::Start(start) if is_element(&start, NODE_ELEMENT) => {
                let node = node_from_attributes(&start)?;
                Some(read_node_body(reader, node)?)
            }
            Event::Empty(start) if is_element(&start, NODE_ELEMENT) => {
                Some(node_from_attributes(&start)?)
            }
            Event::Start(start) => {
                let end = start.to_end().into_owned();
                reader.read_to_end_into(end.name(), &mut Vec::new())?;
                None
            }
            Event::End(end) if end.name().as_ref() == VOCABULARY_ELEMENT.as_bytes() => break,
            Event::Eof => {
                return Err(CodecError::malformed(format!(
                    "document ends inside vocabulary `{name}`"
                )));
            }
            _ => None,
        };
        buf.clear();

        if let Some(node) = node {
            if top.replace(node).is_some() {
                return Err(CodecError::malformed(format!(
                    "vocabulary `{name}` holds more than one top node"
                )));
            }
        }
    }

    let top = top.ok_or_else(|| CodecError::malformed(format!("vocabulary `{name}` has no node")))?;
    if top.name != name {
        return Err(CodecError::malformed(format!(
            "vocabulary `{name}` holds node named `{}`",
            top.name
        )));
    }
    Ok(top)
}

/// Reads properties and child nodes up to the closing `</node>`.
fn read_node_body<B: BufRead>(
    reader: &mut Reader<B>,
    mut node: ImportedNode,
) -> Result<ImportedNode, CodecError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) if is_element(&start, PROPERTIES_ELEMENT) => {
                read_properties(reader, &mut node.content)?;
            }
            Event::Start(start) if is_element(&start, NODE_ELEMENT) => {
                let child = node_from_attributes(&start)?;
                node.children.push(read_node_body(reader, child)?);
            }
            Event::Empty(start) if is_element(&start, NODE_ELEMENT) => {
                node.children.push(node_from_attributes(&start)?);
            }
            Event::Start(start) => {
                let end = start.to_end().into_owned();
                reader.read_to_end_into(end.name(), &mut Vec::new())?;
            }
            Event::End(end) if end.name().as_ref() == NODE_ELEMENT.as_bytes() => break,
            Event::Eof => {
                return Err(CodecError::malformed(format!(
                    "document ends inside node `{}`",
                    node.name
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(node)
}

fn read_properties<B: BufRead>(
    reader: &mut Reader<B>,
    content: &mut NodeContent,
) -> Result<(), CodecError> {
    let mut buf = Vec::new();
    let mut current: Option<(String, String)> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) if is_element(&start, PROPERTY_ELEMENT) => {
                current = Some((required_attribute(&start, NAME_ATTRIBUTE)?, String::new()));
            }
            Event::Empty(start) if is_element(&start, PROPERTY_ELEMENT) => {
                content.insert(required_attribute(&start, NAME_ATTRIBUTE)?, String::new());
            }
            Event::Text(text) => {
                if let Some((_, value)) = current.as_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|err| CodecError::malformed(err.to_string()))?;
                    value.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(end) if end.name().as_ref() == PROPERTY_ELEMENT.as_bytes() => {
                if let Some((name, value)) = current.take() {
                    content.insert(name, value);
                }
            }
            Event::End(end) if end.name().as_ref() == PROPERTIES_ELEMENT.as_bytes() => break,
            Event::Eof => {
                return Err(CodecError::malformed("document ends inside properties"));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn node_from_attributes(start: &BytesStart<'_>) -> Result<ImportedNode, CodecError> {
    let name = required_attribute(start, NAME_ATTRIBUTE)?;
    let kind_text = required_attribute(start, TYPE_ATTRIBUTE)?;
    let kind = NodeKind::parse(&kind_text)
        .filter(|kind| kind.is_taxonomy_content())
        .ok_or_else(|| {
            CodecError::malformed(format!("node `{name}` has unsupported type `{kind_text}`"))
        })?;

    let mut node = ImportedNode::new(kind, name);
    if let Some(identifier) = attribute(start, IDENTIFIER_ATTRIBUTE)? {
        let identity = Uuid::parse_str(&identifier).map_err(|_| {
            CodecError::malformed(format!(
                "node `{}` has invalid identifier `{identifier}`",
                node.name
            ))
        })?;
        node.identity = Some(identity);
    }
    Ok(node)
}

fn is_element(start: &BytesStart<'_>, name: &str) -> bool {
    start.name().as_ref() == name.as_bytes()
}

fn attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>, CodecError> {
    let Some(attribute) = start
        .try_get_attribute(name)
        .map_err(|err| CodecError::malformed(err.to_string()))?
    else {
        return Ok(None);
    };
    let value = attribute
        .unescape_value()
        .map_err(|err| CodecError::malformed(err.to_string()))?;
    Ok(Some(value.into_owned()))
}

fn required_attribute(start: &BytesStart<'_>, name: &str) -> Result<String, CodecError> {
    attribute(start, name)?.ok_or_else(|| {
        CodecError::malformed(format!(
            "<{}> is missing attribute `{name}`",
            String::from_utf8_lossy(start.name().as_ref())
        ))
    })
}

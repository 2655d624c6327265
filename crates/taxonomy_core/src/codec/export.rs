//! Incremental writer for the exchange format.

use super::{
    CodecError, IDENTIFIER_ATTRIBUTE, NAME_ATTRIBUTE, NODE_ELEMENT, PROPERTIES_ELEMENT,
    PROPERTY_ELEMENT, ROOT_ELEMENT, TYPE_ATTRIBUTE, VOCABULARY_ELEMENT,
};
use crate::dimension::Subgraph;
use crate::glob::NameFilter;
use crate::model::node::{NodeKind, TaxonomyNode};
use crate::repo::taxonomy_repo::TaxonomyRepository;
use crate::service::progress::{ProgressEvent, ProgressSink};
use crate::service::taxonomy_service::TaxonomyService;
use log::info;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const INDENT_SIZE: usize = 2;

/// What one export run wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Exported vocabulary names in document order.
    pub vocabularies: Vec<String>,
    /// Total vocabulary and term nodes written.
    pub nodes: usize,
}

/// Exports matching vocabularies of the default subgraph to `path`.
///
/// The file is written in place; a failed run leaves a partial file behind.
pub fn export_to_file<R: TaxonomyRepository>(
    service: &TaxonomyService<R>,
    path: &Path,
    filter: &NameFilter,
    progress: &mut dyn ProgressSink,
) -> Result<ExportSummary, CodecError> {
    let file = File::create(path).map_err(|source| CodecError::Io {
        path: Some(path.to_path_buf()),
        source,
    })?;
    let label = path.display().to_string();
    export_vocabularies(service, BufWriter::new(file), filter, &label, progress)
}

/// Streams matching vocabularies of the default subgraph into `out`.
///
/// `label` names the destination in progress output.
pub fn export_vocabularies<R: TaxonomyRepository, W: Write>(
    service: &TaxonomyService<R>,
    out: W,
    filter: &NameFilter,
    label: &str,
    progress: &mut dyn ProgressSink,
) -> Result<ExportSummary, CodecError> {
    let subgraph = service.dimensions().default_subgraph();
    let mut writer = Writer::new_with_indent(out, b' ', INDENT_SIZE);
    let mut summary = ExportSummary::default();

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))?;

    for vocabulary in service.list_vocabularies()? {
        if !filter.matches(&vocabulary.name) {
            continue;
        }

        writer.write_event(Event::Start(
            BytesStart::new(VOCABULARY_ELEMENT)
                .with_attributes([(NAME_ATTRIBUTE, vocabulary.name.as_str())]),
        ))?;
        let nodes = write_node(&mut writer, service.repo(), &vocabulary, &subgraph)?;
        writer.write_event(Event::End(BytesEnd::new(VOCABULARY_ELEMENT)))?;

        info!(
            "event=export_vocabulary module=codec status=ok vocabulary={} nodes={}",
            vocabulary.name, nodes
        );
        progress.emit(ProgressEvent::Exported {
            vocabulary: vocabulary.name.clone(),
            file: label.to_string(),
        });
        summary.nodes += nodes;
        summary.vocabularies.push(vocabulary.name);
    }

    writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;
    writer.get_mut().write_all(b"\n")?;
    writer.into_inner().flush()?;
    Ok(summary)
}

/// Writes one node and its term subtree; returns the number of nodes written.
fn write_node<R: TaxonomyRepository, W: Write>(
    writer: &mut Writer<W>,
    repo: &R,
    node: &TaxonomyNode,
    subgraph: &Subgraph,
) -> Result<usize, CodecError> {
    let identifier = node.identity.to_string();
    let start = BytesStart::new(NODE_ELEMENT).with_attributes([
        (IDENTIFIER_ATTRIBUTE, identifier.as_str()),
        (NAME_ATTRIBUTE, node.name.as_str()),
        (TYPE_ATTRIBUTE, node.kind.as_str()),
    ]);

    let mut children = repo.list_children(node.identity, subgraph)?;
    children.retain(|child| child.kind == NodeKind::Term);

    if children.is_empty() && node.content.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(1);
    }

    writer.write_event(Event::Start(start))?;
    if !node.content.is_empty() {
        writer.write_event(Event::Start(BytesStart::new(PROPERTIES_ELEMENT)))?;
        for (name, value) in &node.content {
            writer.write_event(Event::Start(
                BytesStart::new(PROPERTY_ELEMENT).with_attributes([(NAME_ATTRIBUTE, name.as_str())]),
            ))?;
            writer.write_event(Event::Text(BytesText::new(value)))?;
            writer.write_event(Event::End(BytesEnd::new(PROPERTY_ELEMENT)))?;
        }
        writer.write_event(Event::End(BytesEnd::new(PROPERTIES_ELEMENT)))?;
    }

    let mut written = 1;
    for child in &children {
        written += write_node(writer, repo, child, subgraph)?;
    }
    writer.write_event(Event::End(BytesEnd::new(NODE_ELEMENT)))?;
    Ok(written)
}

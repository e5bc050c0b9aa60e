//! Container and package document (OPF) parsing
//!
//! `META-INF/container.xml` names the package document; the package document
//! carries metadata, the manifest and the spine.

use std::collections::HashMap;

use roxmltree::{Document, Node, ParsingOptions};

use super::archive::{parent_dir, resolve_path, RawArchive, CONTAINER_PATH};
use super::types::{BookMetadata, ManifestEntry, PackageDescriptor, SpineEntry};
use super::EpubError;

const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// Locate the package document through the container descriptor
pub fn resolve_container(archive: &RawArchive) -> Result<String, EpubError> {
    let content = archive.read_entry(CONTAINER_PATH).map_err(|e| match e {
        EpubError::EntryNotFound(_) => {
            EpubError::InvalidContainer(format!("{} is missing", CONTAINER_PATH))
        }
        other => other,
    })?;

    let doc = parse_xml(&content).map_err(EpubError::InvalidContainer)?;

    let rootfiles: Vec<Node> = doc
        .descendants()
        .filter(|n| n.tag_name().name() == "rootfile")
        .collect();

    // Prefer the OPF rootfile when a container lists alternate renditions
    rootfiles
        .iter()
        .find(|n| n.attribute("media-type") == Some(PACKAGE_MEDIA_TYPE))
        .or_else(|| rootfiles.first())
        .and_then(|n| n.attribute("full-path"))
        .map(|p| p.trim().trim_start_matches('/').to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            EpubError::InvalidContainer("container declares no rootfile full-path".to_string())
        })
}

/// Parse the package document into a descriptor
pub fn resolve_package(
    archive: &RawArchive,
    package_path: &str,
) -> Result<PackageDescriptor, EpubError> {
    let content = archive
        .read_entry(package_path)
        .map_err(|e| EpubError::InvalidPackage(format!("{}: {}", package_path, e)))?;

    let doc = parse_xml(&content).map_err(EpubError::InvalidPackage)?;
    let base_dir = parent_dir(package_path);

    let manifest = parse_manifest(&doc)?;
    let metadata = parse_metadata(&doc, &manifest, &base_dir);

    let mut warnings = Vec::new();
    let spine = parse_spine(&doc, &manifest, &base_dir, &mut warnings)?;

    if spine.is_empty() {
        return Err(EpubError::InvalidPackage(
            "spine has no items that resolve through the manifest".to_string(),
        ));
    }

    tracing::debug!(
        "Package {}: {} manifest items, {} spine items, {} warnings",
        package_path,
        manifest.len(),
        spine.len(),
        warnings.len()
    );

    Ok(PackageDescriptor {
        package_path: package_path.to_string(),
        base_dir,
        metadata,
        manifest,
        spine,
        warnings,
    })
}

fn parse_xml(content: &str) -> Result<Document<'_>, String> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(content, options).map_err(|e| e.to_string())
}

fn parse_manifest(doc: &Document) -> Result<HashMap<String, ManifestEntry>, EpubError> {
    let manifest_node = find_element(doc.root(), "manifest")
        .ok_or_else(|| EpubError::InvalidPackage("package has no manifest".to_string()))?;

    let mut manifest = HashMap::new();
    for node in manifest_node.children().filter(|n| is_named(n, "item")) {
        let (Some(id), Some(href)) = (node.attribute("id"), node.attribute("href")) else {
            tracing::warn!("Skipping manifest item without id or href");
            continue;
        };

        manifest.insert(
            id.to_string(),
            ManifestEntry {
                href: href.to_string(),
                media_type: node.attribute("media-type").unwrap_or_default().to_string(),
                properties: node.attribute("properties").map(|s| s.to_string()),
            },
        );
    }

    Ok(manifest)
}

fn parse_spine(
    doc: &Document,
    manifest: &HashMap<String, ManifestEntry>,
    base_dir: &str,
    warnings: &mut Vec<String>,
) -> Result<Vec<SpineEntry>, EpubError> {
    let spine_node = find_element(doc.root(), "spine")
        .ok_or_else(|| EpubError::InvalidPackage("package has no spine".to_string()))?;

    let mut spine = Vec::new();
    for node in spine_node.children().filter(|n| is_named(n, "itemref")) {
        let Some(idref) = node.attribute("idref") else {
            record_warning(warnings, "spine itemref without idref".to_string());
            continue;
        };

        let Some(item) = manifest.get(idref) else {
            record_warning(
                warnings,
                format!("spine itemref '{}' has no manifest entry", idref),
            );
            continue;
        };

        spine.push(SpineEntry {
            idref: idref.to_string(),
            path: resolve_path(base_dir, &item.href),
            media_type: item.media_type.clone(),
            linear: node.attribute("linear").map(|v| v != "no").unwrap_or(true),
        });
    }

    Ok(spine)
}

fn parse_metadata(
    doc: &Document,
    manifest: &HashMap<String, ManifestEntry>,
    base_dir: &str,
) -> BookMetadata {
    let defaults = BookMetadata::default();
    let scope = find_element(doc.root(), "metadata").unwrap_or_else(|| doc.root());

    // The package names its primary identifier; fall back to the first one
    let identifier = doc
        .root_element()
        .attribute("unique-identifier")
        .and_then(|uid| {
            scope
                .descendants()
                .find(|n| is_named(n, "identifier") && n.attribute("id") == Some(uid))
                .and_then(|n| node_text(&n))
        })
        .or_else(|| first_text(scope, "identifier"));

    BookMetadata {
        title: first_text(scope, "title").unwrap_or(defaults.title),
        author: first_text(scope, "creator").unwrap_or(defaults.author),
        language: first_text(scope, "language").unwrap_or(defaults.language),
        identifier,
        publisher: first_text(scope, "publisher"),
        description: first_text(scope, "description"),
        cover_href: find_cover(scope, manifest).map(|href| resolve_path(base_dir, &href)),
    }
}

/// Cover image href: EPUB 3 property, EPUB 2 meta, then id heuristics
fn find_cover(scope: Node, manifest: &HashMap<String, ManifestEntry>) -> Option<String> {
    if let Some(item) = manifest.values().find(|item| {
        item.properties
            .as_deref()
            .map(|p| p.split_whitespace().any(|prop| prop == "cover-image"))
            .unwrap_or(false)
    }) {
        return Some(item.href.clone());
    }

    let meta_cover = scope
        .descendants()
        .find(|n| is_named(n, "meta") && n.attribute("name") == Some("cover"))
        .and_then(|n| n.attribute("content"))
        .and_then(|id| manifest.get(id));
    if let Some(item) = meta_cover {
        return Some(item.href.clone());
    }

    let mut candidates: Vec<(&String, &ManifestEntry)> = manifest
        .iter()
        .filter(|(id, item)| {
            item.media_type.starts_with("image/") && id.to_lowercase().contains("cover")
        })
        .collect();
    // HashMap order is arbitrary; keep the choice deterministic
    candidates.sort_by(|a, b| a.0.cmp(b.0));
    candidates.first().map(|(_, item)| item.href.clone())
}

/// First non-empty text among elements with this local name (any prefix, any case)
fn first_text(scope: Node, name: &str) -> Option<String> {
    scope
        .descendants()
        .filter(|n| is_named(n, name))
        .find_map(|n| node_text(&n))
}

fn node_text(node: &Node) -> Option<String> {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

fn find_element<'a, 'input>(root: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    root.descendants().find(|n| is_named(n, name))
}

fn is_named(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
}

fn record_warning(warnings: &mut Vec<String>, warning: String) {
    tracing::warn!("{}", warning);
    warnings.push(warning);
}

//! Parsed `<titlepatch>` documents.

use roxmltree::Node;
use serde::Serialize;

use crate::{
    error::{CatalogError, CatalogResult},
    models::GameRecord,
};

/// Parsed vendor patch metadata (`<titlepatch>` document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchDocument {
    /// `titleid` attribute of the root element.
    pub title_id: Option<String>,
    /// `<tag>` elements in document order.
    pub tags: Vec<PatchTag>,
}

/// A `<tag>` grouping of packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchTag {
    /// `name` attribute.
    pub name: Option<String>,
    /// Packages in document order; the last one is the newest.
    pub packages: Vec<PatchPackage>,
}

/// A single update package entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchPackage {
    /// Patch version, e.g. `01.02`.
    pub version: Option<String>,
    /// Package size in bytes as reported by the vendor.
    pub size: Option<u64>,
    /// SHA-1 checksum of the package.
    pub sha1sum: Option<String>,
    /// Download location.
    pub url: Option<String>,
    /// Minimum system software version.
    pub system_version: Option<String>,
    /// `<paramsfo><TITLE>` text, when present.
    pub title: Option<String>,
}

impl PatchDocument {
    /// Parse raw document bytes.
    pub fn parse(raw: &[u8]) -> CatalogResult<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|err| CatalogError::MalformedDocument(format!("not UTF-8: {err}")))?;
        let doc = roxmltree::Document::parse(text)
            .map_err(|err| CatalogError::MalformedDocument(err.to_string()))?;

        let root = doc.root_element();
        if !root.has_tag_name("titlepatch") {
            return Err(CatalogError::MalformedDocument(format!(
                "unexpected root element <{}>",
                root.tag_name().name()
            )));
        }

        let tags: Vec<PatchTag> = children_named(root, "tag").map(parse_tag).collect();
        let document = Self {
            title_id: root.attribute("titleid").map(str::to_string),
            tags,
        };

        // Reject up front so callers can rely on `title()`.
        document.latest_package()?;
        document.title()?;
        Ok(document)
    }

    /// The newest package of the first tag.
    pub fn latest_package(&self) -> CatalogResult<&PatchPackage> {
        let tag = self
            .tags
            .first()
            .ok_or_else(|| CatalogError::MalformedDocument("missing <tag> element".into()))?;
        tag.packages
            .last()
            .ok_or_else(|| CatalogError::MalformedDocument("missing <package> element".into()))
    }

    /// Authoritative title, taken from the last package.
    pub fn title(&self) -> CatalogResult<&str> {
        self.latest_package()?
            .title
            .as_deref()
            .ok_or_else(|| CatalogError::MalformedDocument("last package has no TITLE".into()))
    }

    /// Lowercase search alias of [`Self::title`].
    pub fn alias(&self) -> CatalogResult<String> {
        self.title().map(GameRecord::alias_for)
    }
}

fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |child| child.has_tag_name(name))
}

fn parse_tag(node: Node<'_, '_>) -> PatchTag {
    PatchTag {
        name: node.attribute("name").map(str::to_string),
        packages: children_named(node, "package").map(parse_package).collect(),
    }
}

fn parse_package(node: Node<'_, '_>) -> PatchPackage {
    let title = children_named(node, "paramsfo")
        .next()
        .and_then(|paramsfo| children_named(paramsfo, "TITLE").next())
        .and_then(|title| title.text())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    PatchPackage {
        version: node.attribute("version").map(str::to_string),
        size: node.attribute("size").and_then(|value| value.parse().ok()),
        sha1sum: node.attribute("sha1sum").map(str::to_string),
        url: node.attribute("url").map(str::to_string),
        system_version: node.attribute("ps3_system_ver").map(str::to_string),
        title,
    }
}

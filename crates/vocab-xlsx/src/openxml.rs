//! Open XML names, part paths and helpers for the two bookkeeping documents
//! (`*.rels` relationship lists and `[Content_Types].xml`).

use crate::xml::{NamespaceScope, XmlElement};

pub const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const OFFICE_REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const PACKAGE_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

pub const CONTENT_TYPE_RELATIONSHIPS: &str =
    "application/vnd.openxmlformats-package.relationships+xml";
pub const CONTENT_TYPE_XML: &str = "application/xml";
pub const CONTENT_TYPE_WORKBOOK: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
pub const CONTENT_TYPE_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
pub const CONTENT_TYPE_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";

pub const REL_TYPE_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_TYPE_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub const REL_TYPE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";
pub const WORKBOOK_PART: &str = "xl/workbook.xml";
pub const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
pub const STYLES_PART: &str = "xl/styles.xml";

/// Parts `append` cannot work without.
pub const REQUIRED_PARTS: [&str; 3] = [CONTENT_TYPES_PART, WORKBOOK_PART, WORKBOOK_RELS_PART];

const WORKSHEETS_DIR: &str = "xl/worksheets/";

/// Part name of the `index`-th worksheet, e.g. `xl/worksheets/sheet3.xml`.
pub fn worksheet_part_name(index: u32) -> String {
    format!("{WORKSHEETS_DIR}{}", worksheet_file_name(index))
}

/// Worksheet target relative to `xl/workbook.xml`, e.g. `worksheets/sheet3.xml`.
pub fn worksheet_rel_target(index: u32) -> String {
    format!("worksheets/{}", worksheet_file_name(index))
}

fn worksheet_file_name(index: u32) -> String {
    format!("sheet{index}.xml")
}

/// `N` for a part named exactly `xl/worksheets/sheet<N>.xml`.
pub fn worksheet_part_index(part_name: &str) -> Option<u32> {
    let digits = part_name
        .strip_prefix(WORKSHEETS_DIR)?
        .strip_prefix("sheet")?
        .strip_suffix(".xml")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `N` for a relationship id of the form `rId<N>`.
pub fn relationship_id_number(id: &str) -> Option<u32> {
    id.strip_prefix("rId")?.trim().parse().ok()
}

pub fn relationship_id(number: u32) -> String {
    format!("rId{number}")
}

/// Qualify `local` with the prefix of `like`, so an element inserted under
/// `like` lands in the same namespace.
pub fn qualified_like(like: &XmlElement, local: &str) -> String {
    match like.prefix() {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

/// Next free `rId<N>` in a `<Relationships>` root: one past the highest
/// numeric suffix, `rId1` when there is none.
pub fn next_relationship_id(relationships: &XmlElement, scope: &NamespaceScope) -> String {
    let max = relationships
        .children_in(scope, PACKAGE_REL_NS, "Relationship")
        .filter_map(|rel| rel.attr("Id"))
        .filter_map(relationship_id_number)
        .max()
        .unwrap_or(0);
    relationship_id(max.saturating_add(1))
}

pub fn relationship_element(
    relationships: &XmlElement,
    id: &str,
    type_uri: &str,
    target: &str,
) -> XmlElement {
    XmlElement::new(qualified_like(relationships, "Relationship"))
        .with_attr("Id", id)
        .with_attr("Type", type_uri)
        .with_attr("Target", target)
}

/// Add an `<Override>` for `part_name` unless one with that exact `PartName`
/// exists. `part_name` must carry its leading `/`. Returns whether a new
/// entry was added.
pub fn ensure_override(
    types: &mut XmlElement,
    scope: &NamespaceScope,
    part_name: &str,
    content_type: &str,
) -> bool {
    let exists = types
        .children_in(scope, CONTENT_TYPES_NS, "Override")
        .any(|el| el.attr("PartName") == Some(part_name));
    if exists {
        return false;
    }

    let override_el = XmlElement::new(qualified_like(types, "Override"))
        .with_attr("PartName", part_name)
        .with_attr("ContentType", content_type);
    types.push_child(override_el);
    true
}

//! The fixed parts of a fresh single-sheet workbook.

use crate::openxml::{
    relationship_id, worksheet_part_name, worksheet_rel_target, CONTENT_TYPES_NS,
    CONTENT_TYPE_RELATIONSHIPS, CONTENT_TYPE_STYLES, CONTENT_TYPE_WORKBOOK,
    CONTENT_TYPE_WORKSHEET, CONTENT_TYPE_XML, OFFICE_REL_NS, PACKAGE_REL_NS,
    REL_TYPE_OFFICE_DOCUMENT, REL_TYPE_STYLES, REL_TYPE_WORKSHEET, SPREADSHEETML_NS, STYLES_PART,
    WORKBOOK_PART,
};
use crate::xml::{XmlDocument, XmlElement};

pub(crate) const FIRST_SHEET_INDEX: u32 = 1;

pub(crate) fn content_types_xml() -> XmlDocument {
    let default = |ext: &str, content_type: &str| {
        XmlElement::new("Default")
            .with_attr("Extension", ext)
            .with_attr("ContentType", content_type)
    };
    let override_part = |part: &str, content_type: &str| {
        XmlElement::new("Override")
            .with_attr("PartName", format!("/{part}"))
            .with_attr("ContentType", content_type)
    };

    XmlDocument::new(
        XmlElement::new("Types")
            .with_attr("xmlns", CONTENT_TYPES_NS)
            .with_child(default("rels", CONTENT_TYPE_RELATIONSHIPS))
            .with_child(default("xml", CONTENT_TYPE_XML))
            .with_child(override_part(WORKBOOK_PART, CONTENT_TYPE_WORKBOOK))
            .with_child(override_part(
                &worksheet_part_name(FIRST_SHEET_INDEX),
                CONTENT_TYPE_WORKSHEET,
            ))
            .with_child(override_part(STYLES_PART, CONTENT_TYPE_STYLES)),
    )
}

pub(crate) fn package_rels_xml() -> XmlDocument {
    XmlDocument::new(
        XmlElement::new("Relationships")
            .with_attr("xmlns", PACKAGE_REL_NS)
            .with_child(relationship(1, REL_TYPE_OFFICE_DOCUMENT, WORKBOOK_PART)),
    )
}

pub(crate) fn workbook_xml(sheet_name: &str) -> XmlDocument {
    let sheet = XmlElement::new("sheet")
        .with_attr("name", sheet_name)
        .with_attr("sheetId", FIRST_SHEET_INDEX.to_string())
        .with_attr("r:id", relationship_id(1));

    XmlDocument::new(
        XmlElement::new("workbook")
            .with_attr("xmlns", SPREADSHEETML_NS)
            .with_attr("xmlns:r", OFFICE_REL_NS)
            .with_child(XmlElement::new("sheets").with_child(sheet)),
    )
}

pub(crate) fn workbook_rels_xml() -> XmlDocument {
    XmlDocument::new(
        XmlElement::new("Relationships")
            .with_attr("xmlns", PACKAGE_REL_NS)
            .with_child(relationship(
                1,
                REL_TYPE_WORKSHEET,
                &worksheet_rel_target(FIRST_SHEET_INDEX),
            ))
            .with_child(relationship(2, REL_TYPE_STYLES, "styles.xml")),
    )
}

/// One font, fill, border and cell format: the least Excel opens without a
/// repair prompt.
pub(crate) fn styles_xml() -> XmlDocument {
    let counted = |name: &str, child: XmlElement| {
        XmlElement::new(name)
            .with_attr("count", "1")
            .with_child(child)
    };
    let xf = || {
        XmlElement::new("xf")
            .with_attr("numFmtId", "0")
            .with_attr("fontId", "0")
            .with_attr("fillId", "0")
            .with_attr("borderId", "0")
    };

    let font = XmlElement::new("font")
        .with_child(XmlElement::new("sz").with_attr("val", "11"))
        .with_child(XmlElement::new("name").with_attr("val", "Calibri"));
    let fill = XmlElement::new("fill")
        .with_child(XmlElement::new("patternFill").with_attr("patternType", "none"));
    let border = XmlElement::new("border")
        .with_child(XmlElement::new("left"))
        .with_child(XmlElement::new("right"))
        .with_child(XmlElement::new("top"))
        .with_child(XmlElement::new("bottom"))
        .with_child(XmlElement::new("diagonal"));

    XmlDocument::new(
        XmlElement::new("styleSheet")
            .with_attr("xmlns", SPREADSHEETML_NS)
            .with_child(counted("fonts", font))
            .with_child(counted("fills", fill))
            .with_child(counted("borders", border))
            .with_child(counted("cellStyleXfs", xf()))
            .with_child(counted("cellXfs", xf().with_attr("xfId", "0"))),
    )
}

fn relationship(id: u32, type_uri: &str, target: &str) -> XmlElement {
    XmlElement::new("Relationship")
        .with_attr("Id", relationship_id(id))
        .with_attr("Type", type_uri)
        .with_attr("Target", target)
}

use std::path::Path;

use crate::minimal::{
    content_types_xml, package_rels_xml, styles_xml, workbook_rels_xml, workbook_xml,
    FIRST_SHEET_INDEX,
};
use crate::openxml::{
    ensure_override, next_relationship_id, qualified_like, relationship_element,
    worksheet_part_index, worksheet_part_name, worksheet_rel_target, CONTENT_TYPES_NS,
    CONTENT_TYPES_PART, CONTENT_TYPE_WORKSHEET, OFFICE_REL_NS, PACKAGE_RELS_PART, PACKAGE_REL_NS,
    REL_TYPE_WORKSHEET, REQUIRED_PARTS, SPREADSHEETML_NS, STYLES_PART, WORKBOOK_PART,
    WORKBOOK_RELS_PART,
};
use crate::package::XlsxPackage;
use crate::sheet_name::sanitize_sheet_name;
use crate::worksheet::worksheet_xml;
use crate::xml::{NamespaceScope, XmlDocument, XmlElement};
use crate::XlsxError;

/// Identifiers assigned to a worksheet added by [`append_worksheet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// The name as written to the workbook, after sanitization.
    pub sheet_name: String,
    pub sheet_id: u32,
    pub relationship_id: String,
    /// Part path inside the container, e.g. `xl/worksheets/sheet4.xml`.
    pub worksheet_part: String,
}

/// Assemble a single-sheet container in memory.
pub fn new_workbook_package<R, S>(sheet_name: &str, rows: &[R]) -> Result<XlsxPackage, XlsxError>
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let sheet_name = sanitize_sheet_name(sheet_name);

    let mut pkg = XlsxPackage::new();
    pkg.set_part(CONTENT_TYPES_PART, content_types_xml().to_bytes()?);
    pkg.set_part(PACKAGE_RELS_PART, package_rels_xml().to_bytes()?);
    pkg.set_part(WORKBOOK_PART, workbook_xml(&sheet_name).to_bytes()?);
    pkg.set_part(WORKBOOK_RELS_PART, workbook_rels_xml().to_bytes()?);
    pkg.set_part(STYLES_PART, styles_xml().to_bytes()?);
    pkg.set_part(worksheet_part_name(FIRST_SHEET_INDEX), worksheet_xml(rows)?);
    Ok(pkg)
}

/// Write a new single-sheet workbook to `path`, replacing anything there.
///
/// Returns the sanitized sheet name.
pub fn create_workbook<R, S>(
    path: impl AsRef<Path>,
    sheet_name: &str,
    rows: &[R],
) -> Result<String, XlsxError>
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let pkg = new_workbook_package(sheet_name, rows)?;
    pkg.save(path)?;

    let sheet_name = sanitize_sheet_name(sheet_name);
    log::info!(
        "created {} with sheet '{sheet_name}' ({} rows)",
        path.display(),
        rows.len()
    );
    Ok(sheet_name)
}

/// Add one worksheet to the workbook at `path` and atomically replace the file.
///
/// Every precondition is checked before anything is written, so on error the
/// file on disk is exactly what it was.
pub fn append_worksheet<R, S>(
    path: impl AsRef<Path>,
    sheet_name: &str,
    rows: &[R],
) -> Result<AppendOutcome, XlsxError>
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let mut pkg = XlsxPackage::open(path)?;
    let outcome = append_worksheet_to_package(&mut pkg, sheet_name, rows)?;
    pkg.save(path)?;

    log::info!(
        "appended sheet '{}' to {} as {} (sheetId {}, {})",
        outcome.sheet_name,
        path.display(),
        outcome.worksheet_part,
        outcome.sheet_id,
        outcome.relationship_id
    );
    Ok(outcome)
}

/// In-memory half of [`append_worksheet`].
///
/// Only `xl/workbook.xml`, `xl/_rels/workbook.xml.rels`, `[Content_Types].xml`
/// and the new worksheet part are touched; every other part keeps its bytes.
pub fn append_worksheet_to_package<R, S>(
    pkg: &mut XlsxPackage,
    sheet_name: &str,
    rows: &[R],
) -> Result<AppendOutcome, XlsxError>
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    for part in REQUIRED_PARTS {
        pkg.required_part(part)?;
    }
    let sheet_name = sanitize_sheet_name(sheet_name);

    let mut workbook = XmlDocument::parse(WORKBOOK_PART, pkg.required_part(WORKBOOK_PART)?)?;
    let mut rels = XmlDocument::parse(WORKBOOK_RELS_PART, pkg.required_part(WORKBOOK_RELS_PART)?)?;
    let mut types = XmlDocument::parse(CONTENT_TYPES_PART, pkg.required_part(CONTENT_TYPES_PART)?)?;
    expect_root(&workbook, WORKBOOK_PART, SPREADSHEETML_NS, "workbook")?;
    expect_root(&rels, WORKBOOK_RELS_PART, PACKAGE_REL_NS, "Relationships")?;
    expect_root(&types, CONTENT_TYPES_PART, CONTENT_TYPES_NS, "Types")?;

    let workbook_scope = workbook.scope();
    let sheets = workbook
        .root
        .first_child_in_mut(&workbook_scope, SPREADSHEETML_NS, "sheets")
        .ok_or_else(|| XlsxError::MissingElement {
            part: WORKBOOK_PART.to_string(),
            element: "sheets",
        })?;
    let sheets_scope = workbook_scope.enter(sheets);

    let sheet_id = next_sheet_id(sheets, &sheets_scope, &sheet_name)?;

    let index = next_worksheet_index(pkg);
    let worksheet_part = worksheet_part_name(index);
    if pkg.contains_part(&worksheet_part) {
        return Err(XlsxError::WorksheetPartExists(worksheet_part));
    }

    let rels_scope = rels.scope();
    let relationship_id = next_relationship_id(&rels.root, &rels_scope);

    let sheet = sheet_element(sheets, &sheets_scope, &sheet_name, sheet_id, &relationship_id);
    sheets.push_child(sheet);

    let relationship = relationship_element(
        &rels.root,
        &relationship_id,
        REL_TYPE_WORKSHEET,
        &worksheet_rel_target(index),
    );
    rels.root.push_child(relationship);

    let types_scope = types.scope();
    if !ensure_override(
        &mut types.root,
        &types_scope,
        &format!("/{worksheet_part}"),
        CONTENT_TYPE_WORKSHEET,
    ) {
        log::debug!("content types already list /{worksheet_part}");
    }

    pkg.set_part(WORKBOOK_PART, workbook.to_bytes()?);
    pkg.set_part(WORKBOOK_RELS_PART, rels.to_bytes()?);
    pkg.set_part(CONTENT_TYPES_PART, types.to_bytes()?);
    pkg.set_part(worksheet_part.clone(), worksheet_xml(rows)?);

    Ok(AppendOutcome {
        sheet_name,
        sheet_id,
        relationship_id,
        worksheet_part,
    })
}

fn expect_root(
    doc: &XmlDocument,
    part: &str,
    ns: &str,
    local: &'static str,
) -> Result<(), XlsxError> {
    if NamespaceScope::default().matches(&doc.root, ns, local) {
        Ok(())
    } else {
        Err(XlsxError::MissingElement {
            part: part.to_string(),
            element: local,
        })
    }
}

/// Rejects `sheet_name` if taken, otherwise returns one past the highest
/// `sheetId`. Ids that do not parse count as 0.
fn next_sheet_id(
    sheets: &XmlElement,
    scope: &NamespaceScope,
    sheet_name: &str,
) -> Result<u32, XlsxError> {
    let mut max = 0u32;
    for sheet in sheets.children_in(scope, SPREADSHEETML_NS, "sheet") {
        if sheet.attr("name") == Some(sheet_name) {
            return Err(XlsxError::SheetExists(sheet_name.to_string()));
        }
        let id = sheet
            .attr("sheetId")
            .and_then(|id| id.trim().parse::<u32>().ok())
            .unwrap_or(0);
        max = max.max(id);
    }
    Ok(max.saturating_add(1))
}

/// Index `N` for the next `xl/worksheets/sheet<N>.xml`.
///
/// One past the highest existing `N`; when every match is `sheet0.xml` (or
/// there are none) the count of matches plus one.
fn next_worksheet_index(pkg: &XlsxPackage) -> u32 {
    let indices: Vec<u32> = pkg.part_names().filter_map(worksheet_part_index).collect();
    match indices.iter().copied().max() {
        Some(max) if max > 0 => max.saturating_add(1),
        _ => u32::try_from(indices.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1),
    }
}

fn sheet_element(
    sheets: &XmlElement,
    scope: &NamespaceScope,
    sheet_name: &str,
    sheet_id: u32,
    relationship_id: &str,
) -> XmlElement {
    let mut sheet = XmlElement::new(qualified_like(sheets, "sheet"))
        .with_attr("name", sheet_name)
        .with_attr("sheetId", sheet_id.to_string());
    match scope.prefix_for(OFFICE_REL_NS) {
        Some(prefix) => sheet.set_attr(format!("{prefix}:id"), relationship_id),
        None => {
            sheet.set_attr("xmlns:r", OFFICE_REL_NS);
            sheet.set_attr("r:id", relationship_id);
        }
    }
    sheet
}

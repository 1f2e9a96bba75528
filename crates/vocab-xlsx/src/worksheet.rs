use crate::address::CellRef;
use crate::openxml::SPREADSHEETML_NS;
use crate::xml::{XmlDocument, XmlElement};
use crate::XlsxError;

/// Build a worksheet holding `rows` as inline-string cells.
///
/// Row `i` becomes `<row r="i+1">` with one `<c>` per value, so ragged input
/// keeps its shape. Empty values still get a cell.
pub fn worksheet_document<R, S>(rows: &[R]) -> Result<XmlDocument, XlsxError>
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let mut sheet_data = XmlElement::new("sheetData");
    for (row_idx, row) in rows.iter().enumerate() {
        let row_idx = to_index(row_idx, "row")?;
        let mut row_el = XmlElement::new("row").with_attr("r", (u64::from(row_idx) + 1).to_string());
        for (col_idx, value) in row.as_ref().iter().enumerate() {
            let cell = CellRef::new(row_idx, to_index(col_idx, "column")?);
            row_el.push_child(inline_string_cell(cell, value.as_ref()));
        }
        sheet_data.push_child(row_el);
    }

    let worksheet = XmlElement::new("worksheet")
        .with_attr("xmlns", SPREADSHEETML_NS)
        .with_child(sheet_data);
    Ok(XmlDocument::new(worksheet))
}

/// Serialized form of [`worksheet_document`].
pub fn worksheet_xml<R, S>(rows: &[R]) -> Result<Vec<u8>, XlsxError>
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    worksheet_document(rows)?.to_bytes()
}

fn inline_string_cell(cell: CellRef, text: &str) -> XmlElement {
    let t = XmlElement::new("t")
        .with_attr("xml:space", "preserve")
        .with_text(text);
    XmlElement::new("c")
        .with_attr("r", cell.to_a1())
        .with_attr("t", "inlineStr")
        .with_child(XmlElement::new("is").with_child(t))
}

fn to_index(idx: usize, what: &str) -> Result<u32, XlsxError> {
    u32::try_from(idx).map_err(|_| XlsxError::Invalid(format!("{what} index {idx} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cells(xml: &[u8]) -> Vec<Vec<(String, String)>> {
        let text = std::str::from_utf8(xml).expect("utf-8");
        let doc = roxmltree::Document::parse(text).expect("well-formed worksheet");
        doc.descendants()
            .filter(|n| n.has_tag_name((SPREADSHEETML_NS, "row")))
            .map(|row| {
                row.children()
                    .filter(|n| n.has_tag_name((SPREADSHEETML_NS, "c")))
                    .map(|c| {
                        let text = c
                            .descendants()
                            .find(|n| n.has_tag_name((SPREADSHEETML_NS, "t")))
                            .and_then(|t| t.text())
                            .unwrap_or_default()
                            .to_string();
                        (c.attribute("r").unwrap_or_default().to_string(), text)
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn ragged_rows_keep_their_shape() {
        let rows = vec![vec!["a", "b"], vec!["c"]];
        let xml = worksheet_xml(&rows).expect("worksheet xml");

        assert_eq!(
            cells(&xml),
            vec![
                vec![("A1".to_string(), "a".to_string()), ("B1".to_string(), "b".to_string())],
                vec![("A2".to_string(), "c".to_string())],
            ]
        );
    }

    #[test]
    fn wide_rows_use_multi_letter_columns() {
        let row: Vec<String> = (0..30).map(|i| format!("v{i}")).collect();
        let xml = worksheet_xml(&[row]).expect("worksheet xml");
        let parsed = cells(&xml);

        assert_eq!(parsed[0].len(), 30);
        assert_eq!(parsed[0][25].0, "Z1");
        assert_eq!(parsed[0][26].0, "AA1");
        assert_eq!(parsed[0][29], ("AD1".to_string(), "v29".to_string()));
    }

    #[test]
    fn cells_are_inline_strings_with_preserved_space() {
        let xml = worksheet_xml(&[vec!["  el perro & <gato>  "]]).expect("worksheet xml");
        let text = std::str::from_utf8(&xml).expect("utf-8");
        let doc = roxmltree::Document::parse(text).expect("well-formed");

        let c = doc
            .descendants()
            .find(|n| n.has_tag_name((SPREADSHEETML_NS, "c")))
            .expect("cell");
        assert_eq!(c.attribute("t"), Some("inlineStr"));
        let t = c
            .descendants()
            .find(|n| n.has_tag_name((SPREADSHEETML_NS, "t")))
            .expect("t");
        assert_eq!(
            t.attribute((crate::xml::XML_NS, "space")),
            Some("preserve")
        );
        assert_eq!(t.text(), Some("  el perro & <gato>  "));
    }

    #[test]
    fn empty_row_keeps_following_row_numbers() {
        let rows: Vec<Vec<&str>> = vec![vec!["word"], vec![], vec!["perro"]];
        let xml = String::from_utf8(worksheet_xml(&rows).expect("worksheet xml")).expect("utf-8");

        assert!(xml.contains(r#"<row r="2"/>"#), "{xml}");
        assert!(xml.contains(r#"<row r="3"><c r="A3" t="inlineStr">"#), "{xml}");
    }

    #[test]
    fn empty_rows_and_values_are_kept() {
        let rows: Vec<Vec<&str>> = vec![vec![], vec!["", "x"]];
        let parsed = cells(&worksheet_xml(&rows).expect("worksheet xml"));
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].is_empty());
        assert_eq!(
            parsed[1],
            vec![("A2".to_string(), String::new()), ("B2".to_string(), "x".to_string())]
        );
    }
}

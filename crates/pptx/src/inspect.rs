//! Read-only font report for a presentation.
//!
//! Reads slides straight from the archive without extracting it and lists
//! every run with visible text together with its size, typefaces and fill.

use crate::archive::slide_number;
use crate::run::{Script, TextRun};
use crate::xml::{XmlDocument, PRESENTATIONML_NS};
use restyle_core::{Error, Result, RunFontInfo};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Characters of run text kept in a report entry.
pub const TEXT_PREVIEW_CHARS: usize = 50;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

/// Report the fonts of every non-blank run in the presentation at `path`.
pub fn inspect_fonts(path: &Path) -> Result<Vec<RunFontInfo>> {
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    inspect_reader(BufReader::new(file), &path.display().to_string())
}

/// Report the fonts of a presentation read from `reader`.
pub fn inspect_reader<R: Read + Seek>(reader: R, name: &str) -> Result<Vec<RunFontInfo>> {
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| Error::CorruptArchive(format!("{}: {}", name, e)))?;

    let mut report = Vec::new();
    for (idx, slide_path) in slide_order(&mut archive)?.iter().enumerate() {
        let xml = read_part(&mut archive, slide_path)?;
        let doc = XmlDocument::parse_str(&xml, slide_path)?;

        for el in doc.find_text_runs() {
            let run = TextRun::new(el);
            let text = run.text();
            if text.trim().is_empty() {
                continue;
            }

            let size = run.size_points().unwrap_or_else(|e| {
                log::debug!("{}: {}", slide_path, e);
                None
            });
            let typeface = |script| run.typeface(script).unwrap_or_default().to_string();
            report.push(RunFontInfo {
                slide: idx + 1,
                text: text.chars().take(TEXT_PREVIEW_CHARS).collect(),
                size,
                latin: typeface(Script::Latin),
                ea: typeface(Script::EastAsian),
                cs: typeface(Script::ComplexScript),
                fill: run.fill().kind(),
            });
        }
    }
    Ok(report)
}

/// Slide part names in presentation order.
///
/// The order comes from the slide id list in `presentation.xml`, resolved
/// through the presentation relationships. Without those parts the slide
/// parts found in the archive are used, sorted by number.
fn slide_order<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
    if !archive.file_names().any(|name| name == PRESENTATION_RELS_PART) {
        log::debug!("No {}, ordering slides by part name", PRESENTATION_RELS_PART);
        return Ok(slides_by_number(archive));
    }

    let rels_xml = read_part(archive, PRESENTATION_RELS_PART)?;
    let rels = XmlDocument::parse_str(&rels_xml, PRESENTATION_RELS_PART)?;

    let mut targets: HashMap<String, String> = HashMap::new();
    for rel in rels.root().elements().filter(|e| e.local_name() == "Relationship") {
        let rel_type = rel.attr("Type").unwrap_or_default();
        if !rel_type.ends_with("/slide") {
            continue;
        }
        if let (Some(id), Some(target)) = (rel.attr("Id"), rel.attr("Target")) {
            targets.insert(id.to_string(), resolve_target(target));
        }
    }

    let listed = match read_part(archive, PRESENTATION_PART) {
        Ok(xml) => {
            let presentation = XmlDocument::parse_str(&xml, PRESENTATION_PART)?;
            presentation
                .root()
                .find(PRESENTATIONML_NS, "sldIdLst")
                .map(|list| {
                    list.find_all(PRESENTATIONML_NS, "sldId")
                        .filter_map(|sld| sld.attributes().find(|(k, _)| is_rel_id(k)).map(|(_, v)| v))
                        .filter_map(|id| targets.get(id).cloned())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        }
        Err(_) => Vec::new(),
    };
    if !listed.is_empty() {
        return Ok(listed);
    }

    let mut slides: Vec<String> = targets.into_values().collect();
    slides.sort_by_key(|path| (extract_slide_number(path), path.clone()));
    Ok(slides)
}

fn slides_by_number<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    let mut slides: Vec<(u64, String)> = archive
        .file_names()
        .filter_map(|name| {
            let file = name.strip_prefix("ppt/slides/")?;
            Some((slide_number(file)?, name.to_string()))
        })
        .collect();
    slides.sort();
    slides.into_iter().map(|(_, name)| name).collect()
}

/// `r:id` on a slide id entry; the prefix is whatever the document bound
/// to the relationships namespace, almost always `r`.
fn is_rel_id(key: &str) -> bool {
    key.ends_with(":id") && key != "xml:id"
}

/// Archive path of a relationship target relative to `ppt/`.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target.trim_start_matches("./")),
    }
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("Part not found in archive '{}': {}", path, e)))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Trailing number of a part name or relationship id, e.g. `rId12` → 12.
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".rels").trim_end_matches(".xml");
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use restyle_core::FillKind;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

    fn slide_xml(runs: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {}><p:cSld><p:spTree><p:sp><p:txBody><a:p>{}</a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
            NS, runs
        )
    }

    fn build(entries: &[(&str, String)]) -> Cursor<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        let mut cursor = zip.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("ppt/slides/slide3.xml"), Some(3));
        assert_eq!(extract_slide_number("slide10.xml.rels"), Some(10));
        assert_eq!(extract_slide_number("noNumber"), None);
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(resolve_target("/ppt/slides/slide2.xml"), "ppt/slides/slide2.xml");
    }

    #[test]
    fn test_presentation_order_from_id_list() {
        let rels = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/></Relationships>"#;
        let presentation = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><p:presentation {}><p:sldIdLst><p:sldId id="257" r:id="rId3"/><p:sldId id="256" r:id="rId2"/></p:sldIdLst></p:presentation>"#,
            NS
        );
        let cursor = build(&[
            ("ppt/presentation.xml", presentation),
            ("ppt/_rels/presentation.xml.rels", rels.to_string()),
            (
                "ppt/slides/slide1.xml",
                slide_xml(r#"<a:r><a:rPr sz="1200"><a:latin typeface="Arial"/></a:rPr><a:t>first part</a:t></a:r>"#),
            ),
            (
                "ppt/slides/slide2.xml",
                slide_xml(r#"<a:r><a:rPr sz="2400"><a:ea typeface="微软雅黑"/><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill></a:rPr><a:t>shown first</a:t></a:r><a:r><a:t> </a:t></a:r>"#),
            ),
        ]);

        let report = inspect_reader(cursor, "deck.pptx").unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].slide, 1);
        assert_eq!(report[0].text, "shown first");
        assert_eq!(report[0].size, Some(24.0));
        assert_eq!(report[0].ea, "微软雅黑");
        assert_eq!(report[0].latin, "");
        assert_eq!(report[0].fill, FillKind::Solid);
        assert_eq!(report[1].slide, 2);
        assert_eq!(report[1].latin, "Arial");
    }

    #[test]
    fn test_without_relationships_and_long_text() {
        let long = "x".repeat(80);
        let cursor = build(&[
            (
                "ppt/slides/slide10.xml",
                slide_xml(r#"<a:r><a:t>ten</a:t></a:r>"#),
            ),
            (
                "ppt/slides/slide2.xml",
                slide_xml(&format!("<a:r><a:t>{}</a:t></a:r>", long)),
            ),
        ]);

        let report = inspect_reader(cursor, "deck.pptx").unwrap();
        assert_eq!(report[0].text.chars().count(), TEXT_PREVIEW_CHARS);
        assert_eq!(report[0].size, None);
        assert_eq!(report[1].text, "ten");
        assert_eq!(report[1].slide, 2);
    }

    #[test]
    fn test_not_a_zip() {
        let result = inspect_reader(Cursor::new(b"plain text".to_vec()), "notes.txt");
        assert!(matches!(result, Err(Error::CorruptArchive(_))));
    }
}

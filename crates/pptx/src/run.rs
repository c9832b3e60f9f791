//! Typed access to DrawingML text runs.
//!
//! A run (`<a:r>`) keeps its formatting in an optional `<a:rPr>` child.
//! [`TextRun`] exposes the pieces the engines care about (typefaces per
//! script slot, size, language, fill) and creates missing elements at their
//! schema positions, so callers never touch raw child lists.

use crate::fill::{Fill, FILL_ELEMENTS};
use crate::xml::{XmlElement, DRAWINGML_NS};
use restyle_core::units::points_to_hundredths;
use restyle_core::{Error, GradientStop, LanguageTag, Result};
use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};

/// Child order of `CT_TextCharacterProperties`.
pub const RPR_CHILD_ORDER: &[&str] = &[
    "ln", "noFill", "solidFill", "gradFill", "blipFill", "pattFill", "grpFill", "effectLst",
    "effectDag", "highlight", "uLnTx", "uLn", "uFillTx", "uFill", "latin", "ea", "cs", "sym",
    "hlinkClick", "hlinkMouseOver", "rtl", "extLst",
];

/// Child order of `CT_RegularTextRun`.
const RUN_CHILD_ORDER: &[&str] = &["rPr", "t"];

/// Typeface slot of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Latin,
    EastAsian,
    ComplexScript,
}

impl Script {
    pub const ALL: [Script; 3] = [Script::Latin, Script::EastAsian, Script::ComplexScript];

    /// Local name of the typeface element inside `rPr`.
    pub fn element_name(&self) -> &'static str {
        match self {
            Script::Latin => "latin",
            Script::EastAsian => "ea",
            Script::ComplexScript => "cs",
        }
    }
}

/// View over an `<a:r>` element. Read accessors work on shared references;
/// mutators need a mutable one.
#[derive(Debug)]
pub struct TextRun<R> {
    r: R,
}

impl<R: Deref<Target = XmlElement>> TextRun<R> {
    pub fn new(r: R) -> Self {
        Self { r }
    }

    /// The underlying `<a:r>` element.
    pub fn element(&self) -> &XmlElement {
        &self.r
    }

    /// Run text (the contents of its `<a:t>` children).
    pub fn text(&self) -> String {
        self.r
            .find_all(DRAWINGML_NS, "t")
            .map(|t| t.text())
            .collect()
    }

    /// The `<a:rPr>` element, if present.
    pub fn properties(&self) -> Option<&XmlElement> {
        self.r.find(DRAWINGML_NS, "rPr")
    }

    /// Typeface name in a script slot, if set.
    pub fn typeface(&self, script: Script) -> Option<&str> {
        self.properties()?
            .find(DRAWINGML_NS, script.element_name())?
            .attr("typeface")
    }

    /// Distinct non-empty typeface names across all three slots.
    pub fn typefaces(&self) -> BTreeSet<String> {
        Script::ALL
            .iter()
            .filter_map(|s| self.typeface(*s))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Size in hundredths of a point; `Ok(None)` when unset.
    pub fn size_hundredths(&self) -> Result<Option<u32>> {
        match self.properties().and_then(|rpr| rpr.attr("sz")) {
            None => Ok(None),
            Some(sz) => sz.trim().parse().map(Some).map_err(|_| {
                Error::RuleApplication(format!("run size sz=\"{}\" is not an integer", sz))
            }),
        }
    }

    /// Size in points; `Ok(None)` when unset.
    pub fn size_points(&self) -> Result<Option<f64>> {
        Ok(self.size_hundredths()?.map(|h| f64::from(h) / 100.0))
    }

    /// `lang` attribute of `rPr`.
    pub fn language(&self) -> Option<&str> {
        self.properties()?.attr("lang")
    }

    pub fn fill(&self) -> Fill {
        self.properties()
            .map(Fill::from_properties)
            .unwrap_or(Fill::None)
    }
}

impl<R: DerefMut<Target = XmlElement>> TextRun<R> {
    /// The `<a:rPr>` element, created as the run's first child if missing.
    pub fn properties_mut(&mut self) -> &mut XmlElement {
        self.r.child_or_insert("rPr", RUN_CHILD_ORDER)
    }

    pub fn set_size_hundredths(&mut self, hundredths: u32) {
        self.properties_mut().set_attr("sz", hundredths.to_string());
    }

    pub fn set_size_points(&mut self, points: f64) {
        self.set_size_hundredths(points_to_hundredths(points));
    }

    /// Set the typeface of one script slot, creating its element if needed.
    pub fn set_typeface(&mut self, script: Script, name: &str) {
        self.properties_mut()
            .child_or_insert(script.element_name(), RPR_CHILD_ORDER)
            .set_attr("typeface", name);
    }

    /// Tag the run with a language: `xml:lang` on the run and `lang` on
    /// its properties.
    pub fn set_language(&mut self, tag: LanguageTag) {
        self.r.set_attr("xml:lang", tag.as_str());
        self.properties_mut().set_attr("lang", tag.as_str());
    }

    /// Replace whatever fill the run has. The new fill becomes the first
    /// child of `rPr`.
    pub fn set_fill(&mut self, fill: &Fill) {
        let rpr = self.properties_mut();
        replace_fill(rpr, fill);
    }
}

/// Give a run a gradient fill at the given size.
///
/// Sets `sz`, optionally points all three typeface slots at `font_name`,
/// drops any existing solid or gradient fill and inserts the gradient as
/// the first child of `rPr`.
pub fn apply_gradient_to_run(
    run: &mut XmlElement,
    stops: &[GradientStop],
    size_hundredths: u32,
    font_name: Option<&str>,
) {
    let mut run = TextRun::new(run);
    run.set_size_hundredths(size_hundredths);
    if let Some(font_name) = font_name {
        for script in Script::ALL {
            run.set_typeface(script, font_name);
        }
    }
    run.set_fill(&Fill::Gradient(stops.to_vec()));
}

/// Apply a gradient to a paragraph's `<a:endParaRPr>`, if it has one.
/// Returns whether the paragraph had one.
pub fn apply_gradient_to_end_para(
    paragraph: &mut XmlElement,
    stops: &[GradientStop],
    size_hundredths: Option<u32>,
) -> bool {
    let Some(end) = paragraph.find_mut(DRAWINGML_NS, "endParaRPr") else {
        return false;
    };
    if let Some(sz) = size_hundredths {
        end.set_attr("sz", sz.to_string());
    }
    replace_fill(end, &Fill::Gradient(stops.to_vec()));
    true
}

fn replace_fill(props: &mut XmlElement, fill: &Fill) {
    for name in FILL_ELEMENTS {
        props.remove_children(DRAWINGML_NS, name);
    }
    if let Some(el) = fill.to_element(props.prefix()) {
        // Always the first child, ahead of `ln` if present. This departs
        // from the CT_TextCharacterProperties order, which puts `ln` first.
        props.insert_child(0, el);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;
    use restyle_core::ColorSpec;

    fn parse_run(inner: &str) -> XmlElement {
        let xml = format!(
            r#"<a:r xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">{}</a:r>"#,
            inner
        );
        XmlDocument::parse_str(&xml, "run.xml").unwrap().root().clone()
    }

    #[test]
    fn test_read_accessors() {
        let el = parse_run(
            r#"<a:rPr lang="en-US" sz="1450"><a:latin typeface="Arial"/><a:ea typeface="SimSun"/><a:cs typeface="Arial"/></a:rPr><a:t>Hello</a:t>"#,
        );
        let run = TextRun::new(&el);
        assert_eq!(run.text(), "Hello");
        assert_eq!(run.typeface(Script::Latin), Some("Arial"));
        assert_eq!(run.typeface(Script::EastAsian), Some("SimSun"));
        assert_eq!(run.size_hundredths().unwrap(), Some(1450));
        assert_eq!(run.size_points().unwrap(), Some(14.5));
        assert_eq!(run.language(), Some("en-US"));
        assert_eq!(
            run.typefaces().into_iter().collect::<Vec<_>>(),
            vec!["Arial".to_string(), "SimSun".to_string()]
        );
        assert_eq!(run.fill(), Fill::None);
    }

    #[test]
    fn test_bad_size_is_rule_error() {
        let el = parse_run(r#"<a:rPr sz="big"/><a:t>x</a:t>"#);
        let run = TextRun::new(&el);
        assert!(matches!(run.size_hundredths(), Err(Error::RuleApplication(_))));
    }

    #[test]
    fn test_properties_created_before_text() {
        let mut el = parse_run("<a:t>plain</a:t>");
        let mut run = TextRun::new(&mut el);
        assert!(run.properties().is_none());
        run.set_size_points(20.0);
        run.set_typeface(Script::ComplexScript, "Mangal");
        run.set_typeface(Script::Latin, "Sora");

        let names: Vec<&str> = el.elements().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a:rPr", "a:t"]);
        let rpr = el.find(DRAWINGML_NS, "rPr").unwrap();
        assert_eq!(rpr.attr("sz"), Some("2000"));
        let slots: Vec<&str> = rpr.elements().map(|e| e.local_name()).collect();
        assert_eq!(slots, vec!["latin", "cs"]);
    }

    #[test]
    fn test_set_language() {
        let mut el = parse_run("<a:rPr/><a:t>你好</a:t>");
        TextRun::new(&mut el).set_language(LanguageTag::ZhCn);
        assert_eq!(el.attr("xml:lang"), Some("zh-CN"));
        assert_eq!(TextRun::new(&el).language(), Some("zh-CN"));
    }

    #[test]
    fn test_apply_gradient_replaces_fill() {
        let mut el = parse_run(
            r#"<a:rPr sz="1400"><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill><a:latin typeface="Sora"/></a:rPr><a:t>x</a:t>"#,
        );
        let stops = vec![GradientStop::new(100_000, "#73C6E1"), GradientStop::new(0, "#9A6FDC")];

        apply_gradient_to_run(&mut el, &stops, 1400, Some("Sora"));
        apply_gradient_to_run(&mut el, &stops, 1400, Some("Sora"));

        let rpr = el.find(DRAWINGML_NS, "rPr").unwrap();
        let fills = rpr
            .elements()
            .filter(|e| FILL_ELEMENTS.contains(&e.local_name()))
            .count();
        assert_eq!(fills, 1);
        assert_eq!(rpr.elements().next().map(|e| e.local_name()), Some("gradFill"));

        let run = TextRun::new(&el);
        for script in Script::ALL {
            assert_eq!(run.typeface(script), Some("Sora"));
        }
        match run.fill() {
            Fill::Gradient(read) => {
                assert_eq!(read[0].color, ColorSpec::Hex("9A6FDC".into()));
                assert_eq!(read[1].position, 100_000);
            }
            other => panic!("expected gradient, got {:?}", other),
        }
    }

    #[test]
    fn test_gradient_goes_before_outline() {
        let mut el = parse_run(
            r#"<a:rPr sz="1400"><a:ln w="9525"/><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill><a:latin typeface="Sora"/></a:rPr><a:t>x</a:t>"#,
        );
        apply_gradient_to_run(&mut el, &[GradientStop::new(0, "#000000")], 1400, None);

        let run = TextRun::new(&el);
        let names: Vec<&str> = run
            .properties()
            .map(|rpr| rpr.elements().map(|e| e.local_name()).collect())
            .unwrap_or_default();
        assert_eq!(names, vec!["gradFill", "ln", "latin"]);
    }

    #[test]
    fn test_set_fill_none_clears() {
        let mut el = parse_run(
            r#"<a:rPr><a:gradFill/><a:solidFill/><a:latin typeface="Sora"/></a:rPr><a:t>x</a:t>"#,
        );
        TextRun::new(&mut el).set_fill(&Fill::None);
        let rpr = el.find(DRAWINGML_NS, "rPr").unwrap();
        let names: Vec<&str> = rpr.elements().map(|e| e.local_name()).collect();
        assert_eq!(names, vec!["latin"]);
    }

    #[test]
    fn test_end_para_gradient() {
        let xml = r#"<a:p xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:r><a:t>x</a:t></a:r><a:endParaRPr lang="en-US"><a:solidFill><a:srgbClr val="000000"/></a:solidFill></a:endParaRPr></a:p>"#;
        let mut p = XmlDocument::parse_str(xml, "p.xml").unwrap().root().clone();
        let stops = vec![GradientStop::new(0, "#9A6FDC"), GradientStop::new(100_000, "#73C6E1")];

        assert!(apply_gradient_to_end_para(&mut p, &stops, Some(1800)));
        let end = p.find(DRAWINGML_NS, "endParaRPr").unwrap();
        assert_eq!(end.attr("sz"), Some("1800"));
        assert!(end.find(DRAWINGML_NS, "solidFill").is_none());
        assert!(end.find(DRAWINGML_NS, "gradFill").is_some());

        let mut bare = XmlElement::new_ns("a", "p", DRAWINGML_NS);
        assert!(!apply_gradient_to_end_para(&mut bare, &stops, None));
    }
}

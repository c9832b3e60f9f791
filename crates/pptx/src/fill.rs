//! Text fills and their DrawingML encoding.

use crate::xml::{XmlElement, DRAWINGML_NS};
use restyle_core::{ColorSpec, FillKind, GradientStop};

/// Fill elements that may appear in `rPr`; at most one is allowed.
pub const FILL_ELEMENTS: &[&str] = &[
    "noFill", "solidFill", "gradFill", "blipFill", "pattFill", "grpFill",
];

/// Luminance modulation applied to theme colors in generated gradients.
const SCHEME_LUM_MOD: &str = "45000";
/// Luminance offset applied to theme colors in generated gradients.
const SCHEME_LUM_OFF: &str = "55000";

/// Fill of a text run.
///
/// `None` also stands for fill kinds the model does not carry (picture,
/// pattern and group fills); writing any variant removes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fill {
    None,
    Solid(ColorSpec),
    Gradient(Vec<GradientStop>),
}

impl Fill {
    /// Read the fill declared in a run-properties element.
    pub fn from_properties(rpr: &XmlElement) -> Self {
        if let Some(solid) = rpr.find(DRAWINGML_NS, "solidFill") {
            return solid
                .elements()
                .next()
                .map(|color| Fill::Solid(read_color(color)))
                .unwrap_or(Fill::None);
        }

        if let Some(grad) = rpr.find(DRAWINGML_NS, "gradFill") {
            let stops = grad
                .find(DRAWINGML_NS, "gsLst")
                .map(|list| {
                    list.find_all(DRAWINGML_NS, "gs")
                        .filter_map(|gs| {
                            let position = gs.attr("pos")?.parse().ok()?;
                            let color = gs.elements().next().map(read_color)?;
                            Some(GradientStop { position, color })
                        })
                        .collect()
                })
                .unwrap_or_default();
            return Fill::Gradient(stops);
        }

        Fill::None
    }

    pub fn kind(&self) -> FillKind {
        match self {
            Fill::None => FillKind::None,
            Fill::Solid(_) => FillKind::Solid,
            Fill::Gradient(_) => FillKind::Gradient,
        }
    }

    /// Encode as a DrawingML element written with `prefix`, or `None` for
    /// [`Fill::None`].
    pub fn to_element(&self, prefix: &str) -> Option<XmlElement> {
        match self {
            Fill::None => None,
            Fill::Solid(color) => Some(
                XmlElement::new_ns(prefix, "solidFill", DRAWINGML_NS)
                    .with_child(color_element(prefix, color)),
            ),
            Fill::Gradient(stops) => Some(create_gradient_fill(prefix, stops)),
        }
    }
}

/// Build a linear `gradFill` from `stops`.
///
/// Stops are emitted in ascending position order, followed by
/// `<lin ang="0" scaled="1"/>` and an empty `tileRect`; DrawingML requires
/// exactly this child order.
pub fn create_gradient_fill(prefix: &str, stops: &[GradientStop]) -> XmlElement {
    let mut sorted = stops.to_vec();
    sorted.sort_by_key(|s| s.position);

    let mut gs_list = XmlElement::new_ns(prefix, "gsLst", DRAWINGML_NS);
    for stop in &sorted {
        gs_list.push_child(
            XmlElement::new_ns(prefix, "gs", DRAWINGML_NS)
                .with_attr("pos", stop.position.to_string())
                .with_child(color_element(prefix, &stop.color)),
        );
    }

    XmlElement::new_ns(prefix, "gradFill", DRAWINGML_NS)
        .with_attr("flip", "none")
        .with_attr("rotWithShape", "1")
        .with_child(gs_list)
        .with_child(
            XmlElement::new_ns(prefix, "lin", DRAWINGML_NS)
                .with_attr("ang", "0")
                .with_attr("scaled", "1"),
        )
        .with_child(XmlElement::new_ns(prefix, "tileRect", DRAWINGML_NS))
}

fn color_element(prefix: &str, color: &ColorSpec) -> XmlElement {
    match color {
        ColorSpec::SchemeRef(name) => XmlElement::new_ns(prefix, "schemeClr", DRAWINGML_NS)
            .with_attr("val", name.as_str())
            .with_child(
                XmlElement::new_ns(prefix, "lumMod", DRAWINGML_NS).with_attr("val", SCHEME_LUM_MOD),
            )
            .with_child(
                XmlElement::new_ns(prefix, "lumOff", DRAWINGML_NS).with_attr("val", SCHEME_LUM_OFF),
            ),
        ColorSpec::Hex(value) | ColorSpec::RawToken(value) => {
            XmlElement::new_ns(prefix, "srgbClr", DRAWINGML_NS).with_attr("val", value.as_str())
        }
    }
}

fn read_color(el: &XmlElement) -> ColorSpec {
    let val = el.attr("val").unwrap_or_default().to_string();
    match el.local_name() {
        "srgbClr" => ColorSpec::Hex(val),
        "schemeClr" => ColorSpec::SchemeRef(val),
        "sysClr" => ColorSpec::RawToken(el.attr("lastClr").map(str::to_string).unwrap_or(val)),
        _ => ColorSpec::RawToken(val),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;

    #[test]
    fn test_gradient_fill_layout() {
        let stops = vec![
            GradientStop::new(100_000, "#73C6E1"),
            GradientStop::new(0, "#9A6FDC"),
            GradientStop::new(50_000, "accent1"),
        ];
        let grad = create_gradient_fill("a", &stops);

        assert_eq!(grad.name(), "a:gradFill");
        assert_eq!(grad.attr("flip"), Some("none"));
        assert_eq!(grad.attr("rotWithShape"), Some("1"));

        let children: Vec<&str> = grad.elements().map(|e| e.local_name()).collect();
        assert_eq!(children, vec!["gsLst", "lin", "tileRect"]);

        let lin = grad.find(DRAWINGML_NS, "lin").unwrap();
        assert_eq!(lin.attr("ang"), Some("0"));
        assert_eq!(lin.attr("scaled"), Some("1"));

        let positions: Vec<&str> = grad
            .find(DRAWINGML_NS, "gsLst")
            .unwrap()
            .find_all(DRAWINGML_NS, "gs")
            .filter_map(|gs| gs.attr("pos"))
            .collect();
        assert_eq!(positions, vec!["0", "50000", "100000"]);
    }

    #[test]
    fn test_scheme_color_carries_luminance() {
        let grad = create_gradient_fill(
            "a",
            &[GradientStop::new(0, "accent2"), GradientStop::new(100_000, "FF0000")],
        );
        let list = grad.find(DRAWINGML_NS, "gsLst").unwrap();
        let stops: Vec<&XmlElement> = list.find_all(DRAWINGML_NS, "gs").collect();

        let scheme = stops[0].find(DRAWINGML_NS, "schemeClr").unwrap();
        assert_eq!(scheme.attr("val"), Some("accent2"));
        assert_eq!(
            scheme.find(DRAWINGML_NS, "lumMod").and_then(|e| e.attr("val")),
            Some("45000")
        );
        assert_eq!(
            scheme.find(DRAWINGML_NS, "lumOff").and_then(|e| e.attr("val")),
            Some("55000")
        );

        // raw tokens are written verbatim as RGB values
        let raw = stops[1].find(DRAWINGML_NS, "srgbClr").unwrap();
        assert_eq!(raw.attr("val"), Some("FF0000"));
    }

    #[test]
    fn test_read_fill_back() {
        let xml = r#"<a:rPr xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill></a:rPr>"#;
        let doc = XmlDocument::parse_str(xml, "rpr.xml").unwrap();
        assert_eq!(
            Fill::from_properties(doc.root()),
            Fill::Solid(ColorSpec::SchemeRef("tx1".into()))
        );

        let mut rpr = doc.root().clone();
        rpr.remove_children(DRAWINGML_NS, "solidFill");
        assert_eq!(Fill::from_properties(&rpr), Fill::None);

        let stops = vec![GradientStop::new(0, "#9A6FDC"), GradientStop::new(100_000, "#73C6E1")];
        rpr.push_child(create_gradient_fill("a", &stops));
        assert_eq!(Fill::from_properties(&rpr), Fill::Gradient(stops));
        assert_eq!(Fill::from_properties(&rpr).kind(), FillKind::Gradient);
    }
}

//! SVG export serializer.
//!
//! Converts a [`CurveSet`] into an SVG string using the [`svg`] crate for
//! document construction, XML escaping, and path data formatting.
//!
//! Runs of cells that share endpoints (`cells[i][1] == cells[i + 1][0]`)
//! are chained into one `<path>`; every other cell starts a new one.
//! World coordinates are fitted into a millimetre page with north up.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Path, Title};
use svg::node::{Node, Text, Value};

use geocurve_pipeline::{CurveSet, Point, Polyline};

/// Length of the longer page side in millimetres.
const DOCUMENT_SIZE_MM: f64 = 200.0;
/// Blank border around the drawing, in millimetres.
const MARGIN_MM: f64 = 2.5;

/// Metadata to embed in the SVG document.
///
/// When present, `<title>` and `<desc>` are emitted right after the
/// opening `<svg>` tag; text is XML-escaped by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Detection parameters as JSON, emitted inside `<metadata>` in a
    /// namespaced `<geocurve:detection>` element.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from a polyline.
///
/// Returns an empty string for polylines with fewer than 2 points.
///
/// # Examples
///
/// ```
/// use geocurve_pipeline::{Point, Polyline};
/// use geocurve_export::build_path_data;
///
/// let polyline = Polyline::new(vec![
///     Point::new(10.0, 20.0),
///     Point::new(30.0, 40.0),
/// ]);
/// assert_eq!(build_path_data(&polyline), "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(polyline: &Polyline) -> String {
    let points = polyline.points();
    if points.len() < 2 {
        return String::new();
    }

    let first = &points[0];
    let mut data = Data::new().move_to((first.x, first.y));
    for p in &points[1..] {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

/// Chain the cells of `curves` into polylines.
///
/// A cell continues the current polyline when it starts where the
/// previous cell ended.
#[must_use]
pub fn chain_cells(curves: &CurveSet) -> Vec<Polyline> {
    let mut polylines = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    let mut last_end: Option<u32> = None;

    for &[start, end] in &curves.cells {
        if last_end != Some(start) && !current.is_empty() {
            polylines.push(Polyline::new(std::mem::take(&mut current)));
        }
        if current.is_empty() {
            current.push(curves.vertices[start as usize]);
        }
        current.push(curves.vertices[end as usize]);
        last_end = Some(end);
    }
    if !current.is_empty() {
        polylines.push(Polyline::new(current));
    }
    polylines
}

/// Mapping from world coordinates to the page.
#[derive(Debug, Clone, Copy)]
struct PageTransform {
    min_x: f64,
    max_y: f64,
    scale: f64,
}

impl PageTransform {
    /// Fit the bounding box of `polylines` into the page; `None` when
    /// there is nothing to draw.
    fn fit(polylines: &[Polyline]) -> Option<(Self, f64, f64)> {
        let mut points = polylines.iter().flat_map(Polyline::points);
        let first = points.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let (width, height) = (max_x - min_x, max_y - min_y);
        let longer = width.max(height);
        let drawable = 2.0f64.mul_add(-MARGIN_MM, DOCUMENT_SIZE_MM);
        let scale = if longer > 0.0 { drawable / longer } else { 1.0 };
        let page_width = width.mul_add(scale, 2.0 * MARGIN_MM);
        let page_height = height.mul_add(scale, 2.0 * MARGIN_MM);
        Some((
            Self {
                min_x,
                max_y,
                scale,
            },
            page_width,
            page_height,
        ))
    }

    fn apply(&self, p: Point) -> (f64, f64) {
        (
            (p.x - self.min_x).mul_add(self.scale, MARGIN_MM),
            (self.max_y - p.y).mul_add(self.scale, MARGIN_MM),
        )
    }

    fn path_data(&self, polyline: &Polyline) -> String {
        let points = polyline.points();
        if points.len() < 2 {
            return String::new();
        }
        let mut data = Data::new().move_to(self.apply(points[0]));
        for p in &points[1..] {
            data = data.line_to(self.apply(*p));
        }
        String::from(Value::from(data))
    }
}

/// Serialize curves to an SVG document string.
///
/// The drawing is scaled so its longer side spans the page (200 mm) less
/// a small margin, with north at the top. A curve set without cells
/// yields an empty document.
#[must_use]
pub fn to_svg(curves: &CurveSet, metadata: &SvgMetadata<'_>) -> String {
    let polylines = chain_cells(curves);
    let fitted = PageTransform::fit(&polylines);

    let (page_width, page_height) = fitted.map_or((0.0, 0.0), |(_, w, h)| (w, h));
    let mut doc = Document::new()
        .set("width", format!("{page_width}mm"))
        .set("height", format!("{page_height}mm"))
        .set("viewBox", format!("0 0 {page_width} {page_height}"));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(config_json) = metadata.config_json {
        let mut detection_el = Element::new("geocurve:detection");
        detection_el.assign("xmlns:geocurve", "https://geocurve.dev/ns/1");
        detection_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(detection_el);
        doc = doc.add(metadata_el);
    }

    if let Some((transform, _, _)) = fitted {
        for polyline in &polylines {
            let d = transform.path_data(polyline);
            if d.is_empty() {
                continue;
            }
            let path = Path::new()
                .set("d", d)
                .set("fill", "none")
                .set("stroke", "black")
                .set("stroke-width", 0.3);
            doc = doc.add(path);
        }
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    fn square_path() -> CurveSet {
        CurveSet::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
            vec![[0, 1], [1, 2], [2, 3]],
        )
        .unwrap()
    }

    // --- build_path_data ---

    #[test]
    fn build_path_data_short_polylines_are_empty() {
        assert_eq!(build_path_data(&Polyline::new(vec![])), "");
        assert_eq!(
            build_path_data(&Polyline::new(vec![Point::new(5.0, 5.0)])),
            ""
        );
    }

    #[test]
    fn build_path_data_three_points() {
        let polyline = Polyline::new(vec![
            Point::new(10.0, 15.0),
            Point::new(12.5, 18.3),
            Point::new(14.0, 20.1),
        ]);
        assert_eq!(build_path_data(&polyline), "M10,15 L12.5,18.3 L14,20.1");
    }

    // --- chain_cells ---

    #[test]
    fn connected_cells_form_one_polyline() {
        let polylines = chain_cells(&square_path());
        assert_eq!(polylines.len(), 1);
        assert_eq!(polylines[0].len(), 4);
    }

    #[test]
    fn disconnected_cells_split() {
        let set = CurveSet::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(5.0, 5.0),
                Point::new(6.0, 5.0),
            ],
            vec![[0, 1], [2, 3]],
        )
        .unwrap();
        let polylines = chain_cells(&set);
        assert_eq!(polylines.len(), 2);
        assert!(polylines.iter().all(|p| p.len() == 2));
    }

    #[test]
    fn no_cells_no_polylines() {
        let set = CurveSet::new(vec![Point::new(0.0, 0.0)], Vec::new()).unwrap();
        assert!(chain_cells(&set).is_empty());
    }

    // --- to_svg ---

    #[test]
    fn empty_set_produces_valid_svg_with_no_paths() {
        let set = CurveSet::new(Vec::new(), Vec::new()).unwrap();
        let svg = to_svg(&set, &no_meta());
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains("<svg "));
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn square_fills_page_with_north_up() {
        let svg = to_svg(&square_path(), &no_meta());
        assert!(svg.contains(r#"width="200mm""#));
        assert!(svg.contains(r#"viewBox="0 0 200 200""#));
        // (0, 0) is the south-west corner: bottom-left on the page.
        assert!(svg.contains(r#"d="M2.5,197.5 L197.5,197.5 L197.5,2.5 L2.5,2.5""#));
        assert!(svg.contains(r#"fill="none""#));
    }

    #[test]
    fn one_path_per_chain() {
        let set = CurveSet::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(5.0, 5.0),
                Point::new(6.0, 5.0),
            ],
            vec![[0, 1], [2, 3]],
        )
        .unwrap();
        let svg = to_svg(&set, &no_meta());
        assert_eq!(svg.matches("<path").count(), 2);
    }

    #[test]
    fn metadata_is_embedded_and_escaped() {
        let meta = SvgMetadata {
            title: Some("trend <lines>"),
            description: Some("damping=0.75"),
            config_json: Some(r#"{"damping":0.75}"#),
        };
        let svg = to_svg(&square_path(), &meta);
        assert!(svg.contains("<title>trend &lt;lines&gt;</title>"));
        assert!(svg.contains("<desc>damping=0.75</desc>"));
        assert!(svg.contains(r#"xmlns:geocurve="https://geocurve.dev/ns/1""#));
        assert!(svg.contains("<metadata>"));
    }
}

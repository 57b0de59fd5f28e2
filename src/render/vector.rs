//! Vector renderer and SVG writer.

use serde::Serialize;

use crate::layout::{Bounds, Point, BODY_RADIUS};
use crate::Schematic;

use super::{component_label, lattice_bounds, Renderer};

/// Vector output settings.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorConfig {
    /// Pixels per lattice unit
    pub unit: f64,
    /// Pixels around the drawing
    pub margin: f64,
    pub font_size: f64,
    pub values: bool,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            unit: 12.0,
            margin: 24.0,
            font_size: 12.0,
            values: true,
        }
    }
}

impl VectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, unit: f64) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_font_size(mut self, font_size: f64) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn with_values(mut self, values: bool) -> Self {
        self.values = values;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn as_svg(self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        }
    }
}

/// One drawing primitive in absolute pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Shape {
    /// A wire or pin lead; `net` is empty for leads.
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        net: String,
    },
    /// A component body labelled with its kind symbol.
    Box {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        label: String,
    },
    Dot { x: f64, y: f64, radius: f64 },
    Text {
        x: f64,
        y: f64,
        text: String,
        anchor: Anchor,
    },
}

/// A list of shapes with the canvas size they fit in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorDiagram {
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
    pub shapes: Vec<Shape>,
}

impl VectorDiagram {
    pub fn lines(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().filter(|s| matches!(s, Shape::Line { .. }))
    }

    pub fn boxes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().filter(|s| matches!(s, Shape::Box { .. }))
    }

    pub fn dots(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().filter(|s| matches!(s, Shape::Dot { .. }))
    }

    /// Serialize as a standalone SVG document.
    pub fn to_svg(&self) -> String {
        let mut svg = String::new();
        let (width, height) = (self.width, self.height);

        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">",
        ));
        svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"#ffffff\"/>");

        for shape in &self.shapes {
            match shape {
                Shape::Line { x1, y1, x2, y2, .. } => svg.push_str(&format!(
                    "<line x1=\"{x1:.2}\" y1=\"{y1:.2}\" x2=\"{x2:.2}\" y2=\"{y2:.2}\" stroke=\"#000000\" stroke-width=\"1.4\" stroke-linecap=\"square\"/>",
                )),
                Shape::Box {
                    x,
                    y,
                    width,
                    height,
                    label,
                } => {
                    svg.push_str(&format!(
                        "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{width:.2}\" height=\"{height:.2}\" fill=\"#ffffff\" stroke=\"#000000\" stroke-width=\"1.4\"/>",
                    ));
                    svg.push_str(&format!(
                        "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"monospace\" font-size=\"{}\" text-anchor=\"middle\" dominant-baseline=\"central\">{}</text>",
                        x + width / 2.0,
                        y + height / 2.0,
                        self.font_size,
                        escape_xml(label)
                    ));
                }
                Shape::Dot { x, y, radius } => svg.push_str(&format!(
                    "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"{radius:.2}\" fill=\"#000000\"/>",
                )),
                Shape::Text { x, y, text, anchor } => svg.push_str(&format!(
                    "<text x=\"{x:.2}\" y=\"{y:.2}\" font-family=\"monospace\" font-size=\"{}\" text-anchor=\"{}\" dominant-baseline=\"central\">{}</text>",
                    self.font_size,
                    anchor.as_svg(),
                    escape_xml(text)
                )),
            }
        }

        svg.push_str("</svg>");
        svg
    }
}

/// Maps lattice geometry to pixel coordinates.
#[derive(Debug, Clone, Default)]
pub struct VectorRenderer {
    config: VectorConfig,
}

impl VectorRenderer {
    pub fn new(config: VectorConfig) -> Self {
        Self { config }
    }
}

struct Projection {
    bounds: Bounds,
    unit: f64,
    margin: f64,
}

impl Projection {
    fn x(&self, x: i32) -> f64 {
        self.margin + f64::from(x - self.bounds.min.x) * self.unit
    }

    // Screen y grows downward.
    fn y(&self, y: i32) -> f64 {
        self.margin + f64::from(self.bounds.max.y - y) * self.unit
    }

    fn point(&self, p: Point) -> (f64, f64) {
        (self.x(p.x), self.y(p.y))
    }
}

impl Renderer for VectorRenderer {
    type Output = VectorDiagram;

    fn render(&self, schematic: &Schematic) -> VectorDiagram {
        let config = &self.config;
        let proj = Projection {
            bounds: lattice_bounds(schematic),
            unit: config.unit,
            margin: config.margin,
        };
        let mut shapes = Vec::new();

        for net in schematic.route().iter() {
            for segment in &net.segments {
                let (x1, y1) = proj.point(segment.start);
                let (x2, y2) = proj.point(segment.end);
                shapes.push(Shape::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    net: net.name.clone(),
                });
            }
        }

        // Leads run from the body edge to the pin.
        for placed in schematic.placement().iter() {
            let center = placed.center();
            for &pin in placed.pins.values() {
                let edge = if (pin.y - center.y).abs() > BODY_RADIUS {
                    Point::new(pin.x, center.y + BODY_RADIUS * (pin.y - center.y).signum())
                } else {
                    Point::new(center.x + BODY_RADIUS * (pin.x - center.x).signum(), pin.y)
                };
                let (x1, y1) = proj.point(edge);
                let (x2, y2) = proj.point(pin);
                shapes.push(Shape::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    net: String::new(),
                });
            }
        }

        for placed in schematic.placement().iter() {
            let center = placed.center();
            let corner = Point::new(center.x - BODY_RADIUS, center.y + BODY_RADIUS);
            let (x, y) = proj.point(corner);
            let side = f64::from(2 * BODY_RADIUS) * config.unit;
            let symbol = schematic
                .kinds()
                .get(&placed.kind)
                .map(|spec| spec.symbol.clone())
                .unwrap_or_else(|| placed.kind.clone());
            shapes.push(Shape::Box {
                x,
                y,
                width: side,
                height: side,
                label: symbol,
            });

            let text = component_label(schematic, placed, config.values);
            let (tx, ty) = if placed.is_vertical() {
                (proj.x(center.x + BODY_RADIUS) + config.unit / 2.0, proj.y(center.y))
            } else {
                (proj.x(center.x), proj.y(center.y + BODY_RADIUS) - config.font_size)
            };
            let anchor = if placed.is_vertical() { Anchor::Start } else { Anchor::Middle };
            shapes.push(Shape::Text {
                x: tx,
                y: ty,
                text,
                anchor,
            });
        }

        for net in schematic.route().iter() {
            for &junction in &net.junctions {
                let (x, y) = proj.point(junction);
                shapes.push(Shape::Dot {
                    x,
                    y,
                    radius: config.unit / 4.0,
                });
            }
        }

        // Room on the right for the widest label.
        let label_room = schematic
            .placement()
            .iter()
            .map(|p| component_label(schematic, p, config.values).chars().count())
            .max()
            .unwrap_or(0) as f64
            * config.font_size
            * 0.6;

        VectorDiagram {
            width: config.margin * 2.0 + f64::from(proj.bounds.width()) * config.unit + label_room,
            height: config.margin * 2.0 + f64::from(proj.bounds.height()) * config.unit,
            font_size: config.font_size,
            shapes,
        }
    }
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, Options};

    const DIVIDER: &str = "\
ground GND
node v_in, v_out
battery V1 +9V from GND to v_out
resistor R1 10k from v_in to v_out
resistor R2 5k from v_out to GND";

    fn diagram() -> VectorDiagram {
        compile(DIVIDER, &Options::default())
            .unwrap()
            .render_vector(&VectorConfig::default())
    }

    #[test]
    fn test_one_box_per_component() {
        let diagram = diagram();
        assert_eq!(diagram.boxes().count(), 3);
        assert_eq!(diagram.dots().count(), 1);
        for shape in diagram.boxes() {
            if let Shape::Box { width, height, .. } = shape {
                assert_eq!(*width, 24.0);
                assert_eq!(*height, 24.0);
            }
        }
    }

    #[test]
    fn test_shapes_fit_the_canvas() {
        let diagram = diagram();
        for shape in &diagram.shapes {
            let (x, y) = match shape {
                Shape::Line { x2, y2, .. } => (*x2, *y2),
                Shape::Box { x, y, .. } | Shape::Dot { x, y, .. } | Shape::Text { x, y, .. } => (*x, *y),
            };
            assert!(x >= 0.0 && x <= diagram.width, "{:?}", shape);
            assert!(y >= 0.0 && y <= diagram.height, "{:?}", shape);
        }
    }

    #[test]
    fn test_svg_escapes_text() {
        let diagram = VectorDiagram {
            width: 100.0,
            height: 50.0,
            font_size: 12.0,
            shapes: vec![Shape::Text {
                x: 10.0,
                y: 10.0,
                text: "R<1> & \"co\"".to_string(),
                anchor: Anchor::Start,
            }],
        };
        let svg = diagram.to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("R&lt;1&gt; &amp; &quot;co&quot;"));
    }

    #[test]
    fn test_diagram_serializes_with_shape_tags() {
        let json = serde_json::to_value(diagram()).unwrap();
        let shapes = json["shapes"].as_array().unwrap();
        assert!(shapes.iter().any(|s| s["shape"] == "box"));
        assert!(shapes.iter().any(|s| s["shape"] == "line"));
    }
}

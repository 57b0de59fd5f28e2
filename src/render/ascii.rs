//! ASCII renderer.
//!
//! Each lattice column becomes `column_width` characters and each lattice
//! row one text line, with `y` flipped so the ground rail is at the bottom.
//! Wires are drawn first, then bodies, pin leads and finally labels, which
//! only go into blank space.

use crate::circuit::NetId;
use crate::kinds::Glyph;
use crate::layout::{Bounds, PlacedComponent, Point, BODY_RADIUS};
use crate::Schematic;

use super::{component_label, lattice_bounds, Renderer};

/// ASCII output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiConfig {
    /// Characters per lattice column (at least 2)
    pub column_width: usize,
    /// Blank characters around the drawing
    pub margin: usize,
    /// Draw reference labels
    pub labels: bool,
    /// Append values to labels
    pub values: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            column_width: 2,
            margin: 1,
            labels: true,
            values: true,
        }
    }
}

impl AsciiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column_width(mut self, width: usize) -> Self {
        self.column_width = width;
        self
    }

    pub fn with_margin(mut self, margin: usize) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_labels(mut self, labels: bool) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_values(mut self, values: bool) -> Self {
        self.values = values;
        self
    }
}

/// Draws a schematic as fixed-width text.
#[derive(Debug, Clone, Default)]
pub struct AsciiRenderer {
    config: AsciiConfig,
}

impl AsciiRenderer {
    pub fn new(config: AsciiConfig) -> Self {
        Self { config }
    }
}

impl Renderer for AsciiRenderer {
    type Output = String;

    fn render(&self, schematic: &Schematic) -> String {
        let bounds = lattice_bounds(schematic);
        let labels: Vec<String> = schematic
            .placement()
            .iter()
            .map(|placed| component_label(schematic, placed, self.config.values))
            .collect();
        let label_room = if self.config.labels {
            labels.iter().map(|l| l.chars().count() + 2).max().unwrap_or(0)
        } else {
            0
        };

        let mut canvas = Canvas::new(bounds, &self.config, label_room);

        for net in schematic.route().iter() {
            for segment in net.segments.iter().filter(|s| s.is_horizontal()) {
                let ch = if net.is_ground && segment.start.y == 0 { '=' } else { '-' };
                for p in segment.points() {
                    canvas.wire(p, ch, net.net, p != segment.end);
                }
            }
        }
        for net in schematic.route().iter() {
            for segment in net.segments.iter().filter(|s| s.is_vertical()) {
                for p in segment.points() {
                    canvas.wire(p, '|', net.net, false);
                }
            }
        }
        for net in schematic.route().iter() {
            for &junction in &net.junctions {
                canvas.set(junction, '*');
            }
        }

        for placed in schematic.placement().iter() {
            let glyph = schematic
                .kinds()
                .get(&placed.kind)
                .map(|spec| spec.glyph.clone())
                .unwrap_or_else(|| Glyph::boxed("?"));
            canvas.body(placed, &glyph);
            canvas.leads(placed);
        }

        if self.config.labels {
            for (placed, label) in schematic.placement().iter().zip(&labels) {
                if !canvas.label(placed, label) {
                    canvas.label(placed, &placed.reference);
                }
            }
        }

        canvas.finish()
    }
}

#[derive(Debug, Clone, Copy)]
struct Tile {
    ch: char,
    net: Option<NetId>,
    reserved: bool,
}

impl Tile {
    const BLANK: Tile = Tile {
        ch: ' ',
        net: None,
        reserved: false,
    };

    fn is_blank(&self) -> bool {
        self.ch == ' ' && !self.reserved
    }
}

struct Canvas {
    tiles: Vec<Vec<Tile>>,
    bounds: Bounds,
    column_width: usize,
    margin: usize,
}

impl Canvas {
    fn new(bounds: Bounds, config: &AsciiConfig, label_room: usize) -> Self {
        let column_width = config.column_width.max(2);
        let width = config.margin * 2 + bounds.width() as usize * column_width + 1 + label_room;
        let height = config.margin * 2 + bounds.height() as usize + 1;
        Self {
            tiles: vec![vec![Tile::BLANK; width]; height],
            bounds,
            column_width,
            margin: config.margin,
        }
    }

    fn col(&self, x: i32) -> usize {
        self.margin + (x - self.bounds.min.x) as usize * self.column_width
    }

    fn row(&self, y: i32) -> usize {
        self.margin + (self.bounds.max.y - y) as usize
    }

    /// Row for a point that may lie outside the drawing.
    fn try_row(&self, y: i32) -> Option<usize> {
        let row = self.margin as i32 + self.bounds.max.y - y;
        usize::try_from(row).ok().filter(|&r| r < self.tiles.len())
    }

    fn tile_mut(&mut self, row: usize, col: usize) -> Option<&mut Tile> {
        self.tiles.get_mut(row).and_then(|r| r.get_mut(col))
    }

    fn set(&mut self, p: Point, ch: char) {
        let (row, col) = (self.row(p.y), self.col(p.x));
        if let Some(tile) = self.tile_mut(row, col) {
            tile.ch = ch;
        }
    }

    /// Draw one wire point, turning same-net crossings into corners.
    /// `run_on` fills the characters up to the next lattice column.
    fn wire(&mut self, p: Point, ch: char, net: NetId, run_on: bool) {
        let (row, col) = (self.row(p.y), self.col(p.x));
        self.wire_at(row, col, ch, net);

        if run_on {
            for extra in 1..self.column_width {
                if let Some(tile) = self.tile_mut(row, col + extra) {
                    if tile.ch == ' ' {
                        *tile = Tile {
                            ch,
                            net: Some(net),
                            reserved: false,
                        };
                    }
                }
            }
        }
    }

    fn wire_at(&mut self, row: usize, col: usize, ch: char, net: NetId) {
        let Some(tile) = self.tile_mut(row, col) else {
            return;
        };
        tile.ch = match (tile.ch, tile.net) {
            (' ', _) => ch,
            (existing, Some(owner)) if owner == net && existing != ch => '+',
            (existing, Some(owner)) if owner == net => existing,
            _ => ch,
        };
        tile.net = Some(net);
    }

    fn body(&mut self, placed: &PlacedComponent, glyph: &Glyph) {
        let center = placed.center();
        let rows = glyph.rows(placed.is_vertical(), placed.flipped);
        let left = self.col(center.x - BODY_RADIUS);
        let right = self.col(center.x + BODY_RADIUS);
        let start = self.col(center.x).saturating_sub(2);

        for (i, text) in rows.iter().enumerate() {
            let row = self.row(center.y + BODY_RADIUS - i as i32);
            for col in left..=right {
                if let Some(tile) = self.tile_mut(row, col) {
                    *tile = Tile {
                        ch: ' ',
                        net: None,
                        reserved: true,
                    };
                }
            }
            for (offset, ch) in text.chars().enumerate() {
                if let Some(tile) = self.tile_mut(row, start + offset) {
                    tile.ch = ch;
                    tile.reserved = true;
                }
            }
        }
    }

    /// Short leads from the body edge out to each pin.
    fn leads(&mut self, placed: &PlacedComponent) {
        let center = placed.center();
        for &pin in placed.pins.values() {
            let row = self.row(pin.y);
            if (pin.y - center.y).abs() > BODY_RADIUS {
                self.lead(row, self.col(pin.x), '|');
            } else if pin.x > center.x {
                for col in self.col(center.x) + 3..=self.col(pin.x) {
                    self.lead(row, col, '-');
                }
            } else {
                for col in self.col(pin.x)..=self.col(center.x).saturating_sub(3) {
                    self.lead(row, col, '-');
                }
            }
        }
    }

    fn lead(&mut self, row: usize, col: usize, ch: char) {
        if let Some(tile) = self.tile_mut(row, col) {
            match tile.ch {
                ' ' => tile.ch = ch,
                '-' | '=' if ch == '|' => tile.ch = '+',
                '|' if ch == '-' => tile.ch = '+',
                _ => {}
            }
        }
    }

    /// Try a few spots around the body; returns whether the label fit.
    fn label(&mut self, placed: &PlacedComponent, text: &str) -> bool {
        let center = placed.center();
        let len = text.chars().count();
        let (col, rows) = if placed.is_vertical() {
            (self.col(center.x) + 4, [center.y, center.y + 1, center.y - 1])
        } else {
            (self.col(center.x).saturating_sub(2), [center.y + 2, center.y - 2, center.y + 3])
        };

        let rows: Vec<usize> = rows.into_iter().filter_map(|y| self.try_row(y)).collect();
        for row in rows {
            let fits = (col.saturating_sub(1)..col + len + 1)
                .all(|c| self.tiles.get(row).and_then(|r| r.get(c)).is_some_and(Tile::is_blank));
            if fits {
                for (offset, ch) in text.chars().enumerate() {
                    if let Some(tile) = self.tile_mut(row, col + offset) {
                        tile.ch = ch;
                        tile.reserved = true;
                    }
                }
                return true;
            }
        }
        false
    }

    fn finish(self) -> String {
        let mut out = String::new();
        for row in &self.tiles {
            let line: String = row.iter().map(|t| t.ch).collect();
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::{compile, AsciiConfig, Options};

    const DIVIDER: &str = "\
ground GND
node v_in, v_out
battery V1 +9V from GND to v_out
resistor R1 10k from v_in to v_out
resistor R2 5k from v_out to GND";

    fn render(source: &str, config: &AsciiConfig) -> String {
        let schematic = compile(source, &Options::default()).unwrap();
        schematic.render_ascii(config)
    }

    #[test]
    fn test_divider_drawing() {
        let art = render(DIVIDER, &AsciiConfig::default());
        let lines: Vec<&str> = art.lines().collect();

        assert!(art.contains("V1"), "{}", art);
        assert!(art.contains("R1 10k"), "{}", art);
        assert!(art.contains("R2 5k"), "{}", art);
        assert!(art.contains('*'), "junction missing:\n{}", art);
        // The ground rail is the last drawn line.
        let rail = lines.iter().rev().find(|l| !l.trim().is_empty()).unwrap();
        assert!(rail.contains("=="), "{}", art);
        // R1 sits above R2, so its label comes first.
        let r1 = lines.iter().position(|l| l.contains("R1")).unwrap();
        let r2 = lines.iter().position(|l| l.contains("R2")).unwrap();
        assert!(r1 < r2);
    }

    #[test]
    fn test_labels_can_be_turned_off() {
        let art = render(DIVIDER, &AsciiConfig::new().with_labels(false));
        assert!(!art.contains("R1"));
        let art = render(DIVIDER, &AsciiConfig::new().with_values(false));
        assert!(art.contains("R1"));
        assert!(!art.contains("10k"));
    }

    #[test]
    fn test_rendering_is_stable() {
        let config = AsciiConfig::default();
        assert_eq!(render(DIVIDER, &config), render(DIVIDER, &config));
    }
}

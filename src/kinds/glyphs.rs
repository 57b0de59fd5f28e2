//! ASCII drawing templates for component bodies.
//!
//! A template is 3 rows of 5 characters covering the body's 3x3 lattice
//! block at two characters per lattice column. Rows run top to bottom in the
//! unflipped orientation: `from` at the bottom for vertical drawings and on
//! the left for horizontal ones.

/// Body templates for both orientations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    pub vertical: [String; 3],
    pub horizontal: [String; 3],
}

impl Glyph {
    pub fn new(vertical: [&str; 3], horizontal: [&str; 3]) -> Self {
        Self {
            vertical: vertical.map(fit),
            horizontal: horizontal.map(fit),
        }
    }

    /// A box with the symbol centred in it.
    pub fn boxed(symbol: &str) -> Self {
        let label: String = symbol.chars().take(3).collect();
        let rows = ["+---+".to_string(), format!("|{:^3}|", label), "+---+".to_string()];
        Self {
            vertical: rows.clone(),
            horizontal: rows,
        }
    }

    /// Rows for an orientation, mirrored when the component is flipped.
    pub fn rows(&self, vertical: bool, flipped: bool) -> Vec<String> {
        let rows = if vertical { &self.vertical } else { &self.horizontal };
        match (vertical, flipped) {
            (_, false) => rows.to_vec(),
            (true, true) => rows.iter().rev().map(|r| r.chars().map(mirror_vertical).collect()).collect(),
            (false, true) => rows
                .iter()
                .map(|r| r.chars().rev().map(mirror_horizontal).collect())
                .collect(),
        }
    }
}

fn fit(row: &str) -> String {
    let mut row: String = row.chars().take(5).collect();
    while row.chars().count() < 5 {
        row.push(' ');
    }
    row
}

fn mirror_vertical(ch: char) -> char {
    match ch {
        '^' => 'v',
        'v' => '^',
        '/' => '\\',
        '\\' => '/',
        _ => ch,
    }
}

fn mirror_horizontal(ch: char) -> char {
    match ch {
        '<' => '>',
        '>' => '<',
        '/' => '\\',
        '\\' => '/',
        '(' => ')',
        ')' => '(',
        _ => ch,
    }
}

pub(super) fn resistor() -> Glyph {
    Glyph::new(["  /  ", "  \\  ", "  /  "], ["     ", "/\\/\\/", "     "])
}

pub(super) fn capacitor() -> Glyph {
    Glyph::new([" --- ", "     ", " --- "], [" | | ", "-| |-", " | | "])
}

pub(super) fn inductor() -> Glyph {
    Glyph::new(["  )  ", "  )  ", "  )  "], ["     ", "(((((", "     "])
}

pub(super) fn diode() -> Glyph {
    Glyph::new([" --- ", "  ^  ", "  |  "], ["     ", "->|--", "     "])
}

pub(super) fn battery() -> Glyph {
    Glyph::new([" === ", "  -  ", " === "], [" | | ", "-| |-", " |   "])
}

pub(super) fn ac_source() -> Glyph {
    Glyph::new([" .-. ", " (~) ", " '-' "], [" .-. ", "-(~)-", " '-' "])
}

pub(super) fn switch() -> Glyph {
    Glyph::new(["  o  ", "   / ", "  o  "], ["     ", "o_/ o", "     "])
}

pub(super) fn wire() -> Glyph {
    Glyph::new(["  |  ", "  |  ", "  |  "], ["     ", "-----", "     "])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_five_wide() {
        for glyph in [resistor(), capacitor(), diode(), battery(), Glyph::boxed("LED")] {
            for row in glyph.vertical.iter().chain(glyph.horizontal.iter()) {
                assert_eq!(row.chars().count(), 5, "row {:?}", row);
            }
        }
    }

    #[test]
    fn test_flipped_diode_points_down() {
        let rows = diode().rows(true, true);
        assert_eq!(rows, vec!["  |  ", "  v  ", " --- "]);
        let rows = diode().rows(false, true);
        assert_eq!(rows[1], "--|<-");
    }
}

//! Display/selection abstraction the command handlers drive.
//!
//! A [`Surface`] shows one row per article, tracks the selected row and is
//! made of panes that may or may not accept a color palette.

use anyhow::Result;

/// Background/foreground pair applied to colorable panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bg: &'static str,
    pub fg: &'static str,
}

pub const LIGHT: Palette = Palette {
    bg: "#f0f0f0",
    fg: "black",
};

pub const DARK: Palette = Palette {
    bg: "#1e1e1e",
    fg: "white",
};

pub fn palette_for(dark: bool) -> Palette {
    if dark {
        DARK
    } else {
        LIGHT
    }
}

/// A top-level part of the surface.
pub trait Pane {
    fn name(&self) -> &str;

    /// Apply `palette`. Panes without color support return an error.
    fn recolor(&mut self, palette: Palette) -> Result<()>;
}

pub trait Surface {
    /// Replace every row. Any selection is cleared.
    fn set_rows(&mut self, rows: Vec<String>);

    fn row_count(&self) -> usize;

    fn selection(&self) -> Option<usize>;

    /// Select `row`; returns false (leaving the selection as is) when out of range.
    fn select(&mut self, row: usize) -> bool;

    /// Text shown above the list, e.g. the active filters.
    fn set_header(&mut self, text: String);

    /// Show a short message to the user.
    fn notify(&mut self, title: &str, message: &str);

    fn panes_mut(&mut self) -> Vec<&mut dyn Pane>;

    /// Draw the whole surface again.
    fn redraw(&mut self);
}

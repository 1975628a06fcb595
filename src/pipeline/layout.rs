//! Fixed 2x2 grid geometry for the assembled page.
//!
//! Cell offsets are expressed from the **top-left** corner of the page, which
//! is how people describe a grid. PDF user space has its origin at the
//! bottom-left, so [`GridLayout::cell_rect`] flips the y axis before the
//! assembler places an image.

use serde::{Deserialize, Serialize};

/// A4 width in PDF points (210 mm).
pub const A4_WIDTH_PT: f32 = 595.28;
/// A4 height in PDF points (297 mm).
pub const A4_HEIGHT_PT: f32 = 841.89;

/// Placement rectangle in PDF user space (origin bottom-left, points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRect {
    pub left: f32,
    pub bottom: f32,
    pub width: f32,
    pub height: f32,
}

/// Page size, cell size and cell offsets of the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub cell_width: f32,
    pub cell_height: f32,
    /// Left edge of each column, from the page's left edge.
    pub column_offsets: [f32; 2],
    /// Top edge of each row, from the page's top edge.
    pub row_offsets: [f32; 2],
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            page_width: A4_WIDTH_PT,
            page_height: A4_HEIGHT_PT,
            cell_width: 280.0,
            cell_height: 200.0,
            column_offsets: [0.0, 290.0],
            row_offsets: [0.0, 230.0],
        }
    }
}

impl GridLayout {
    /// Number of images one page holds.
    pub const CELLS: usize = 4;

    /// `(column, row)` of the `index`-th image: row-major, two columns.
    pub fn cell_position(index: usize) -> (usize, usize) {
        (index % 2, index / 2)
    }

    /// Rectangle for the `index`-th image, already in PDF coordinates.
    ///
    /// Returns `None` for indices outside the grid.
    pub fn cell_rect(&self, index: usize) -> Option<CellRect> {
        if index >= Self::CELLS {
            return None;
        }
        let (col, row) = Self::cell_position(index);
        let top = self.row_offsets[row];
        Some(CellRect {
            left: self.column_offsets[col],
            bottom: self.page_height - top - self.cell_height,
            width: self.cell_width,
            height: self.cell_height,
        })
    }

    /// Check that every cell lies on the page.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_width <= 0.0 || self.page_height <= 0.0 {
            return Err("page dimensions must be positive".into());
        }
        if self.cell_width <= 0.0 || self.cell_height <= 0.0 {
            return Err("cell dimensions must be positive".into());
        }
        for index in 0..Self::CELLS {
            let (col, row) = Self::cell_position(index);
            let right = self.column_offsets[col] + self.cell_width;
            let bottom_edge = self.row_offsets[row] + self.cell_height;
            if self.column_offsets[col] < 0.0 || right > self.page_width {
                return Err(format!("column {} does not fit the page width", col + 1));
            }
            if self.row_offsets[row] < 0.0 || bottom_edge > self.page_height {
                return Err(format!("row {} does not fit the page height", row + 1));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_row_major() {
        assert_eq!(GridLayout::cell_position(0), (0, 0));
        assert_eq!(GridLayout::cell_position(1), (1, 0));
        assert_eq!(GridLayout::cell_position(2), (0, 1));
        assert_eq!(GridLayout::cell_position(3), (1, 1));
    }

    #[test]
    fn default_cells_flip_to_pdf_space() {
        let grid = GridLayout::default();

        let first = grid.cell_rect(0).unwrap();
        assert_eq!(first.left, 0.0);
        assert!((first.bottom - (A4_HEIGHT_PT - 200.0)).abs() < 1e-3);

        let last = grid.cell_rect(3).unwrap();
        assert_eq!(last.left, 290.0);
        assert!((last.bottom - (A4_HEIGHT_PT - 430.0)).abs() < 1e-3);
        assert_eq!(last.width, 280.0);
        assert_eq!(last.height, 200.0);
    }

    #[test]
    fn out_of_grid_index_has_no_cell() {
        assert!(GridLayout::default().cell_rect(4).is_none());
    }

    #[test]
    fn default_layout_is_valid() {
        GridLayout::default().validate().expect("default grid fits A4");
    }

    #[test]
    fn oversized_cells_are_rejected() {
        let grid = GridLayout {
            cell_width: 400.0,
            ..GridLayout::default()
        };
        let err = grid.validate().unwrap_err();
        assert!(err.contains("column 2"), "got: {err}");
    }
}

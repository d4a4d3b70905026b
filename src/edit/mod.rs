//! Structural-edit geometry: how row/column edits move drawing objects.
//!
//! A [`RangeEdit`] describes one grid edit (insert, delete, move, or
//! copy-insert along one axis). [`transform_anchor`] decides what the edit
//! does to a single top-level anchor and applies the coordinate change,
//! reporting whether the owning shape must additionally be cloned or torn
//! down. The drawing layer drives the structural work; formula token
//! adjustment is delegated to the host through
//! [`RefRewriter`](crate::obj::RefRewriter) with the same [`RangeEdit`]
//! value.
//!
//! Anchors gate all movement on their attachment flags: a shape marked
//! "don't move or size with cells" is transparent to every edit, and a
//! "move but don't size" shape translates without stretching.
use crate::consts::{MAX_COLS, MAX_ROWS};
use crate::error::{DrawingError, Result};
use crate::escher::anchor::{AnchorAttachment, ClientAnchor};
use crate::obj::CellPos;

/// Grid axis an edit runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Cols,
}

/// Inclusive, 0-based rectangle of sheet cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetRange {
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

impl SheetRange {
    pub const fn new(first_row: u32, last_row: u32, first_col: u32, last_col: u32) -> Self {
        Self {
            first_row,
            last_row,
            first_col,
            last_col,
        }
    }

    /// Full-width band of rows.
    pub const fn rows(first: u32, last: u32) -> Self {
        Self::new(first, last, 0, MAX_COLS - 1)
    }

    /// Full-height band of columns.
    pub const fn cols(first: u32, last: u32) -> Self {
        Self::new(0, MAX_ROWS - 1, first, last)
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_row > self.last_row
            || self.first_col > self.last_col
            || self.last_row >= MAX_ROWS
            || self.last_col >= MAX_COLS
        {
            return Err(DrawingError::AnchorOutOfBounds {
                row: self.last_row,
                col: self.last_col,
            });
        }
        Ok(())
    }

    /// First coordinate along `axis`.
    pub const fn start(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Rows => self.first_row,
            Axis::Cols => self.first_col,
        }
    }

    /// Last coordinate along `axis`.
    pub const fn end(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Rows => self.last_row,
            Axis::Cols => self.last_col,
        }
    }

    /// Coordinate count along `axis`.
    pub const fn extent(&self, axis: Axis) -> u32 {
        self.end(axis) - self.start(axis) + 1
    }

    pub fn intersect(&self, other: &SheetRange) -> Option<SheetRange> {
        let range = SheetRange::new(
            self.first_row.max(other.first_row),
            self.last_row.min(other.last_row),
            self.first_col.max(other.first_col),
            self.last_col.min(other.last_col),
        );
        (range.first_row <= range.last_row && range.first_col <= range.last_col).then_some(range)
    }

    /// Whether the anchor's cell span lies entirely inside this range.
    pub fn contains_anchor(&self, anchor: &ClientAnchor) -> bool {
        (anchor.row1 as u32) >= self.first_row
            && (anchor.row2 as u32) <= self.last_row
            && (anchor.col1 as u32) >= self.first_col
            && (anchor.col2 as u32) <= self.last_col
    }
}

/// What a [`RangeEdit`] does to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// Open `count` copies of the region's extent at the region start,
    /// pushing everything at or past it along the axis.
    Insert { count: u32 },
    /// Remove the region's extent, pulling everything past it back.
    Delete,
    /// Relocate the region's content so its top-left corner lands on
    /// `dest`; the vacated source cells then behave as cleared.
    Move { dest: CellPos },
    /// Insert `count` copies of the region directly after it, duplicating
    /// the shapes the region fully contains into each copy.
    CopyInsert { count: u32 },
}

/// One structural grid edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEdit {
    pub region: SheetRange,
    pub axis: Axis,
    pub kind: EditKind,
}

impl RangeEdit {
    /// Insert `count` rows ahead of `first_row`.
    pub const fn insert_rows(first_row: u32, count: u32) -> Self {
        Self {
            region: SheetRange::rows(first_row, first_row),
            axis: Axis::Rows,
            kind: EditKind::Insert { count },
        }
    }

    /// Insert `count` columns ahead of `first_col`.
    pub const fn insert_cols(first_col: u32, count: u32) -> Self {
        Self {
            region: SheetRange::cols(first_col, first_col),
            axis: Axis::Cols,
            kind: EditKind::Insert { count },
        }
    }

    pub const fn delete_rows(first_row: u32, last_row: u32) -> Self {
        Self {
            region: SheetRange::rows(first_row, last_row),
            axis: Axis::Rows,
            kind: EditKind::Delete,
        }
    }

    pub const fn delete_cols(first_col: u32, last_col: u32) -> Self {
        Self {
            region: SheetRange::cols(first_col, last_col),
            axis: Axis::Cols,
            kind: EditKind::Delete,
        }
    }

    pub const fn move_range(region: SheetRange, axis: Axis, dest: CellPos) -> Self {
        Self {
            region,
            axis,
            kind: EditKind::Move { dest },
        }
    }

    /// Insert `count` copies of the row band `first_row..=last_row` after it.
    pub const fn copy_insert_rows(first_row: u32, last_row: u32, count: u32) -> Self {
        Self {
            region: SheetRange::rows(first_row, last_row),
            axis: Axis::Rows,
            kind: EditKind::CopyInsert { count },
        }
    }

    /// Reject edits that address cells outside the grid. Runs before any
    /// shape is touched; a failed validation leaves the tree unmodified.
    pub fn validate(&self) -> Result<()> {
        self.region.validate()?;
        if let EditKind::Move { dest } = self.kind {
            let row = dest.row.saturating_add(self.region.last_row - self.region.first_row);
            let col = dest.col.saturating_add(self.region.last_col - self.region.first_col);
            if row >= MAX_ROWS || col >= MAX_COLS {
                return Err(DrawingError::AnchorOutOfBounds { row, col });
            }
        }
        Ok(())
    }

    /// Destination rectangle of a move, `None` for other kinds.
    pub fn move_destination(&self) -> Option<SheetRange> {
        let EditKind::Move { dest } = self.kind else {
            return None;
        };
        Some(SheetRange::new(
            dest.row,
            dest.row.saturating_add(self.region.last_row - self.region.first_row),
            dest.col,
            dest.col.saturating_add(self.region.last_col - self.region.first_col),
        ))
    }
}

/// What [`transform_anchor`] decided for one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorOutcome {
    /// Outside the edit's influence; anchor untouched.
    Keep,
    /// Anchor coordinates were rewritten in place.
    Adjusted,
    /// Bounds lay entirely inside a deleted extent; the shape goes away.
    Remove,
    /// Fully inside a copy-insert source region: the shape stays put and
    /// the caller materializes `copies` clones, clone k offset by k source
    /// extents along the axis.
    Clone { copies: u32 },
}

/// Apply one edit to one top-level anchor.
///
/// Child anchors never come through here: shapes inside a group keep their
/// group-relative coordinates and ride on the group's own client anchor.
pub fn transform_anchor(anchor: &mut ClientAnchor, edit: &RangeEdit) -> AnchorOutcome {
    let attachment = anchor.attachment();
    if attachment == AnchorAttachment::DontMoveOrSize {
        return AnchorOutcome::Keep;
    }
    let axis = edit.axis;
    let (b1, b2) = anchor_span(anchor, axis);
    match edit.kind {
        EditKind::Insert { count } => {
            // shifts larger than the grid clamp at the edge; keep the i32 sums in range
            let delta = edit.region.extent(axis).saturating_mul(count).min(MAX_ROWS) as i32;
            shift_for_insert(anchor, axis, edit.region.start(axis), delta, attachment)
        }
        EditKind::CopyInsert { count } => {
            let inside = b1 >= edit.region.start(axis) && b2 <= edit.region.end(axis);
            if inside && count > 0 {
                return AnchorOutcome::Clone { copies: count };
            }
            let delta = edit.region.extent(axis).saturating_mul(count).min(MAX_ROWS) as i32;
            shift_for_insert(anchor, axis, edit.region.end(axis) + 1, delta, attachment)
        }
        EditKind::Delete => {
            let r1 = edit.region.start(axis);
            let r2 = edit.region.end(axis);
            if b1 >= r1 && b2 <= r2 {
                return AnchorOutcome::Remove;
            }
            let extent = edit.region.extent(axis) as i32;
            match attachment {
                AnchorAttachment::MoveDontSize => {
                    // keep the span length, pull the start out of the hole
                    let delta = if b1 > r2 {
                        -extent
                    } else if b1 >= r1 {
                        r1 as i32 - b1 as i32
                    } else {
                        0
                    };
                    if delta == 0 {
                        AnchorOutcome::Keep
                    } else {
                        shift_axis(anchor, axis, delta);
                        AnchorOutcome::Adjusted
                    }
                }
                _ => {
                    let m1 = collapse_deleted(b1, r1, r2, extent);
                    let m2 = collapse_deleted(b2, r1, r2, extent);
                    if (m1, m2) == (b1, b2) {
                        AnchorOutcome::Keep
                    } else {
                        set_anchor_span(anchor, axis, m1, m2);
                        AnchorOutcome::Adjusted
                    }
                }
            }
        }
        EditKind::Move { dest } => {
            if !edit.region.contains_anchor(anchor) {
                return AnchorOutcome::Keep;
            }
            anchor.shift_rows(dest.row as i32 - edit.region.first_row as i32);
            anchor.shift_cols(dest.col as i32 - edit.region.first_col as i32);
            AnchorOutcome::Adjusted
        }
    }
}

/// Source cells a move leaves behind: the source region minus its overlap
/// with the destination, as disjoint rectangles (at most two when source
/// and destination are the same shape).
pub fn vacated_rects(edit: &RangeEdit) -> Vec<SheetRange> {
    let src = edit.region;
    let Some(dest) = edit.move_destination() else {
        return Vec::new();
    };
    let Some(overlap) = src.intersect(&dest) else {
        return vec![src];
    };
    let mut out = Vec::new();
    if overlap.first_row > src.first_row {
        out.push(SheetRange::new(
            src.first_row,
            overlap.first_row - 1,
            src.first_col,
            src.last_col,
        ));
    }
    if overlap.last_row < src.last_row {
        out.push(SheetRange::new(
            overlap.last_row + 1,
            src.last_row,
            src.first_col,
            src.last_col,
        ));
    }
    if overlap.first_col > src.first_col {
        out.push(SheetRange::new(
            overlap.first_row,
            overlap.last_row,
            src.first_col,
            overlap.first_col - 1,
        ));
    }
    if overlap.last_col < src.last_col {
        out.push(SheetRange::new(
            overlap.first_row,
            overlap.last_row,
            overlap.last_col + 1,
            src.last_col,
        ));
    }
    out
}

fn anchor_span(anchor: &ClientAnchor, axis: Axis) -> (u32, u32) {
    match axis {
        Axis::Rows => (anchor.row1 as u32, anchor.row2 as u32),
        Axis::Cols => (anchor.col1 as u32, anchor.col2 as u32),
    }
}

fn set_anchor_span(anchor: &mut ClientAnchor, axis: Axis, b1: u32, b2: u32) {
    match axis {
        Axis::Rows => {
            anchor.row1 = b1 as u16;
            anchor.row2 = b2 as u16;
        }
        Axis::Cols => {
            anchor.col1 = b1 as u16;
            anchor.col2 = b2 as u16;
        }
    }
}

fn shift_axis(anchor: &mut ClientAnchor, axis: Axis, delta: i32) {
    match axis {
        Axis::Rows => anchor.shift_rows(delta),
        Axis::Cols => anchor.shift_cols(delta),
    }
}

fn shift_for_insert(
    anchor: &mut ClientAnchor,
    axis: Axis,
    point: u32,
    delta: i32,
    attachment: AnchorAttachment,
) -> AnchorOutcome {
    if delta == 0 {
        return AnchorOutcome::Keep;
    }
    let (b1, b2) = anchor_span(anchor, axis);
    if b1 >= point {
        shift_axis(anchor, axis, delta);
        return AnchorOutcome::Adjusted;
    }
    if b2 >= point && attachment == AnchorAttachment::MoveAndSize {
        // straddling shape stretches over the inserted cells
        set_anchor_span(anchor, axis, b1, (b2 as i32 + delta) as u32);
        return AnchorOutcome::Adjusted;
    }
    AnchorOutcome::Keep
}

/// Map one coordinate through a deletion of `[r1, r2]`.
fn collapse_deleted(coord: u32, r1: u32, r2: u32, extent: i32) -> u32 {
    if coord > r2 {
        (coord as i32 - extent) as u32
    } else if coord >= r1 {
        r1
    } else {
        coord
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy to generate each attachment mode.
    fn attachment_strategy() -> impl Strategy<Value = AnchorAttachment> {
        prop_oneof![
            Just(AnchorAttachment::MoveAndSize),
            Just(AnchorAttachment::MoveDontSize),
            Just(AnchorAttachment::DontMoveOrSize),
        ]
    }

    /// Strategy to generate in-grid anchors of every attachment mode.
    fn anchor_strategy() -> impl Strategy<Value = ClientAnchor> {
        (0u16..200, 0u16..40, 0u16..20, 0u16..8, attachment_strategy()).prop_map(
            |(row1, col1, rows, cols, attachment)| {
                let mut anchor = ClientAnchor::over_cells(row1, col1, row1 + rows, col1 + cols);
                anchor.set_attachment(attachment);
                anchor
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Deleting exactly the rows an insert added puts every anchor back
        /// where it started, whatever its attachment mode.
        #[test]
        fn prop_insert_then_delete_restores_anchors(
            anchor in anchor_strategy(),
            point in 0u32..100,
            count in 1u32..4,
        ) {
            let mut edited = anchor;
            transform_anchor(&mut edited, &RangeEdit::insert_rows(point, count));
            let undo = RangeEdit::delete_rows(point, point + count - 1);
            let outcome = transform_anchor(&mut edited, &undo);

            prop_assert_ne!(outcome, AnchorOutcome::Remove);
            prop_assert_eq!(edited, anchor);
        }

        /// A surviving anchor stays ordered, never grows, and still
        /// validates after any row deletion.
        #[test]
        fn prop_delete_keeps_spans_ordered(
            anchor in anchor_strategy(),
            first in 0u32..60,
            extent in 1u32..10,
        ) {
            let mut edited = anchor;
            let edit = RangeEdit::delete_rows(first, first + extent - 1);
            if transform_anchor(&mut edited, &edit) != AnchorOutcome::Remove {
                prop_assert!(edited.row1 <= edited.row2);
                prop_assert!(edited.row2 <= anchor.row2);
                prop_assert!(edited.validate().is_ok());
            }
        }

        /// The vacated rectangles of a move tile the source cells the
        /// destination does not reclaim: each such cell in exactly one
        /// rectangle, every other cell in none.
        #[test]
        fn prop_vacated_rects_tile_the_moved_from_cells(
            src_row in 0u32..12, src_rows in 1u32..5,
            src_col in 0u32..6, src_cols in 1u32..4,
            dest_row in 0u32..14, dest_col in 0u32..8,
        ) {
            let edit = RangeEdit::move_range(
                SheetRange::new(src_row, src_row + src_rows - 1, src_col, src_col + src_cols - 1),
                Axis::Rows,
                CellPos { row: dest_row, col: dest_col },
            );
            let dest = edit.move_destination().unwrap();
            let rects = vacated_rects(&edit);

            for row in 0..24 {
                for col in 0..16 {
                    let probe = SheetRange::new(row, row, col, col);
                    let in_src = edit.region.intersect(&probe).is_some();
                    let in_dest = dest.intersect(&probe).is_some();
                    let covering = rects
                        .iter()
                        .filter(|rect| rect.intersect(&probe).is_some())
                        .count();
                    prop_assert_eq!(covering, usize::from(in_src && !in_dest));
                }
            }
        }
    }
}

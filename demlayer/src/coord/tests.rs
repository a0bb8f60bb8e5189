//! Tests for bounding boxes and tile grids

use super::*;

fn world() -> BBox {
    BBox::new(-180.0, -90.0, 180.0, 90.0).unwrap()
}

#[test]
fn test_bbox_parse_valid() {
    let bbox = BBox::parse("-10, -10,10,10").unwrap();
    assert_eq!(bbox.min_x, -10.0);
    assert_eq!(bbox.max_y, 10.0);
    assert_eq!(bbox.width(), 20.0);
}

#[test]
fn test_bbox_parse_inverted() {
    let result = BBox::parse("10,10,-10,-10");
    assert!(matches!(result, Err(CoordError::Inverted { .. })));
}

#[test]
fn test_bbox_parse_wrong_field_count() {
    assert_eq!(BBox::parse("1,2,3"), Err(CoordError::FieldCount(3)));
}

#[test]
fn test_bbox_parse_not_a_number() {
    assert_eq!(
        BBox::parse("1,2,x,4"),
        Err(CoordError::NotANumber("x".to_string()))
    );
}

#[test]
fn test_bbox_rejects_nan() {
    assert_eq!(
        BBox::new(f64::NAN, 0.0, 1.0, 1.0),
        Err(CoordError::NonFinite)
    );
}

#[test]
fn test_bbox_from_corners_normalises() {
    let bbox = BBox::from_corners((5.0, -1.0), (-5.0, 1.0)).unwrap();
    assert_eq!(bbox, BBox::new(-5.0, -1.0, 5.0, 1.0).unwrap());
}

#[test]
fn test_num_levels() {
    assert_eq!(num_levels(1, 1), 1);
    assert_eq!(num_levels(2, 2), 2);
    assert_eq!(num_levels(8, 4), 3);
    assert_eq!(num_levels(16, 9), 4);
}

#[test]
fn test_level_dims_round_up() {
    let grid = TileGrid::new(world(), 6, 5).unwrap();
    assert_eq!(grid.num_levels(), 3);
    assert_eq!(grid.level_dims(2), Some((6, 5)));
    assert_eq!(grid.level_dims(1), Some((3, 3)));
    assert_eq!(grid.level_dims(0), Some((2, 2)));
    assert_eq!(grid.level_dims(3), None);
}

#[test]
fn test_index_roundtrip() {
    let grid = TileGrid::new(world(), 4, 2).unwrap();
    let coord = TileCoord::new(1, 3, 1);
    let index = grid.index_of(coord).unwrap();
    assert_eq!(index, 7);
    assert_eq!(grid.coord_at(1, index), Some(coord));
    assert_eq!(grid.index_of(TileCoord::new(1, 4, 0)), None);
}

#[test]
fn test_tile_bbox_row_zero_is_north() {
    let grid = TileGrid::new(world(), 4, 2).unwrap();
    let bbox = grid.tile_bbox(TileCoord::new(1, 0, 0));
    assert_eq!(bbox, BBox::new(-180.0, 0.0, -90.0, 90.0).unwrap());

    let coarse = grid.tile_bbox(TileCoord::new(0, 1, 0));
    assert_eq!(coarse, BBox::new(0.0, -90.0, 180.0, 90.0).unwrap());
}

#[test]
fn test_padded_tile_bbox() {
    let grid = TileGrid::new(BBox::new(0.0, 0.0, 10.0, 10.0).unwrap(), 1, 1).unwrap();
    let padded = grid.padded_tile_bbox(TileCoord::new(0, 0, 0), 10, 2);
    assert_eq!(padded, BBox::new(-2.0, -2.0, 12.0, 12.0).unwrap());
}

#[test]
fn test_children() {
    let children = TileCoord::new(0, 1, 2).children();
    assert_eq!(children[0], TileCoord::new(1, 2, 4));
    assert_eq!(children[3], TileCoord::new(1, 3, 5));
}

#[test]
fn test_empty_grid_rejected() {
    assert_eq!(TileGrid::new(world(), 0, 3), Err(CoordError::EmptyGrid));
}

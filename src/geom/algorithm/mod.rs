mod circle;
mod clean;
mod distance;
mod erosion;
mod lines;
mod offset;
mod shape;
mod voronoi;

pub(crate) use clean::{explode, fill_holes, repair, unique_indices};
pub(crate) use distance::{
    closest_on_line_string, coord_distance, multi_polygon_segments, perimeter, segment_distance,
    shape_distance, shared_boundary_length,
};
pub(crate) use erosion::erosion_parts;
pub(crate) use lines::{end_direction, line_orientation, sample_with_direction};
pub(crate) use offset::union_all;
pub(crate) use shape::{
    cardinal_deviation, centroid_corner_distance, circular_compactness, elongation,
    equivalent_rectangular_index, orientation,
};
pub(crate) use voronoi::voronoi_regions;

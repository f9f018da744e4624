mod engine;
mod metric;
mod neighbourhood;
mod primary;
mod street;

pub use engine::{Morphometrics, COMBINED, ROAD_ORIENTATION};
pub use metric::{Metric, Target};
pub use street::road_orientation;

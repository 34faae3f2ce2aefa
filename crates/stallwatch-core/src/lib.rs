pub mod detection;
pub mod geom;
pub mod model;
pub mod occupancy;
pub mod report;
pub mod stalls;

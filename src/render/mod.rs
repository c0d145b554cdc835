pub mod colormap;
pub mod png;

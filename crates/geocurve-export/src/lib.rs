//! geocurve-export: Pure format serializers (sans-IO)
//!
//! Converts curve sets into output formats. Currently supports SVG.

pub mod svg;

pub use svg::{SvgMetadata, build_path_data, chain_cells, to_svg};

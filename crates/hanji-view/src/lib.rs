//! Presentation layer for Hanji: block render dispatch and list virtualization.
//!
//! Neither module writes to the document. Rendering is a pure function of
//! block state and an explicit [`RenderContext`]; virtualization only decides
//! which rows of an already ordered list to draw.

pub mod render;
pub mod virtual_list;

pub use render::{
    BlockRenderer, EditMode, RenderContext, Rendered, RendererRegistry, RowInfo, page_rows,
    render_block,
};
pub use virtual_list::{
    DEFAULT_END_THRESHOLD, DEFAULT_OVERSCAN, Footer, ItemHeight, VirtualList, VisibleRange,
};

//! Layout analysis: spans → lines → blocks
//!
//! ```text
//! PageSpans ──group_lines──▶ Line[] ──HeaderFooterFilter──▶ Line[] ──group_blocks──▶ Block[]
//!                 ▲                                                      ▲
//!                 └──────────── estimate_body_size (document-wide) ──────┘
//! ```

pub mod blocks;
pub mod font;
pub mod furniture;
pub mod lines;

pub use blocks::{Block, group_blocks};
pub use font::estimate_body_size;
pub use furniture::{HeaderFooterFilter, is_page_noise};
pub use lines::{Line, PageLines, group_lines};

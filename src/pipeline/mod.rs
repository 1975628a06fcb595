//! Conversion stages between an uploaded PDF and a downloadable grid.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ rasterize ──▶ (page PNGs) ──▶ assemble ──▶ grid PDF
//!            (pdfium)                      (pdfium, layout)
//! ```
//!
//! 1. [`rasterize`] — render every page to `<prefix><n>.png`; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`layout`]    — fixed 2x2 geometry on an A4 page
//! 3. [`assemble`]  — place four images into that geometry and write the PDF

pub mod assemble;
pub mod layout;
pub mod rasterize;

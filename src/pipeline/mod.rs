//! Pipeline stages from dispatch input to exported sheets.
//!
//! Each submodule implements one step. The pdfium-backed pieces sit behind
//! traits ([`surface::RenderSurface`], [`assemble::PageAssembler`],
//! [`sink::ImageSink`]) so the export loop can run without pdfium.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ tabular / delimited ──▶ group ──▶ layout ──▶ render ──▶ encode ──▶ assemble / sink
//! (path)      (calamine / csv)    (stores)   (pdfium)   (pdfium)    (JPEG)     (PDF / files)
//! ```
//!
//! 1. [`input`]     : read a path or stdin and decide spreadsheet vs. text
//! 2. [`tabular`], [`delimited`] : decode rows and feed the grouping step
//! 3. [`group`]     : one policy-driven normaliser from rows to `StoreOrder`s
//! 4. [`layout`]    : draw the summary and one sheet per store with pdfium
//! 5. [`render`]    : rasterise sheets; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 6. [`encode`]    : JPEG-encode each raster
//! 7. [`assemble`], [`sink`] : collect pages into a PDF or write images

pub mod assemble;
pub mod delimited;
pub mod encode;
pub mod group;
pub mod input;
pub mod layout;
pub mod render;
pub mod sink;
pub mod surface;
pub mod tabular;

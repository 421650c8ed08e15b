//! Report generation for adaptest.
//!
//! [`text`] renders a single session for the terminal; [`html`] renders a
//! simulation batch as a self-contained page.

pub mod html;
pub mod text;

pub use html::{generate_html, write_html_report};
pub use text::session_report;

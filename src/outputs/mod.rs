//! Output generation for delivered mails.
//!
//! # Submodules
//!
//! - [`html`]: the document shell and the fragment builders every job
//!   composes its body from
//!
//! Rendering is pure: nothing here performs I/O. The rendered page is handed
//! to a [`crate::delivery::Deliver`] implementation together with a subject.

pub mod html;

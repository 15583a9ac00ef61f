//! The five worker job shapes of spec §4.4, one module each.

pub mod compile;
pub mod deploy;
pub mod extraction;
pub mod fetch;
pub mod ocr_coordinator;
pub mod ocr_page;

pub mod diagnostics;
pub mod process;
pub mod rational;

pub use diagnostics::{Diagnostic, Reporter};

//! Output backend seam.

use crate::emit::{EmittedProcedure, Registration};

/// Everything a backend needs to render one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    /// First comment line.
    pub header: String,
    /// Schema package.
    pub package: String,
    /// Converter registrations; `None` when the init routine is disabled.
    pub registrations: Option<Vec<Registration>>,
    /// Procedures in target declaration order.
    pub procedures: Vec<EmittedProcedure>,
}

/// Renders emitted procedures as source text of a target language.
pub trait Backend {
    /// Renders a single procedure.
    fn render_procedure(&self, procedure: &EmittedProcedure) -> String;

    /// Renders the converter registration routine.
    fn render_registrations(&self, registrations: &[Registration]) -> String;

    /// Renders a complete output file.
    fn render_file(&self, file: &EmittedFile) -> String;
}

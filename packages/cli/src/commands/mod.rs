pub mod apply;
pub mod generate;
pub mod identify;
pub mod plan;

pub use apply::{apply, ApplyArgs};
pub use generate::{generate, GenerateArgs};
pub use identify::{identify, IdentifyArgs};
pub use plan::{plan, PlanArgs};

use crate::config::Config;
use anyhow::{Context, Result};
use scl_editor::{Document, Intent};
use std::path::Path;

/// Load an SCL file with the configured indentation
pub(crate) fn load_document(file: &Path, config: &Config) -> Result<Document> {
    let doc = Document::load(file.to_path_buf())
        .with_context(|| format!("Cannot load {}", file.display()))?;
    Ok(doc.with_indent(config.indent_string()))
}

/// Read an intent from a JSON file, `-` reads stdin
pub(crate) fn read_intent(path: &Path, config: &Config) -> Result<Intent> {
    let content = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?
    };
    let intent: Intent = serde_json::from_str(&content)
        .with_context(|| format!("Invalid intent in {}", path.display()))?;
    Ok(intent.with_default_inst_type(config.inst_type))
}

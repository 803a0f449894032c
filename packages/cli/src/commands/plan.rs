use crate::config::{Config, OutputFormat};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use scl_editor::{EditAction, Selector, XmlDocument};
use scl_parser::ast::{Fragment, NodeId, NodeKind};
use std::path::PathBuf;

use super::{load_document, read_intent};

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// SCL file
    pub file: PathBuf,

    /// Intent JSON file, `-` for stdin
    pub intent: PathBuf,

    /// Output format (overrides config)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

pub fn plan(args: PlanArgs, config: &Config) -> Result<()> {
    let doc = load_document(&args.file, config)?;
    let intent = read_intent(&args.intent, config)?;
    let actions = doc.plan(&intent)?;

    match args.format.unwrap_or(config.format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&actions)?),
        OutputFormat::Text => {
            println!(
                "{} {} actions",
                intent.name().bright_blue().bold(),
                actions.len()
            );
            for action in &actions {
                println!("  {}", describe(doc.tree(), action));
            }
        }
    }
    Ok(())
}

/// One line summary of an action
pub(crate) fn describe(tree: &XmlDocument, action: &EditAction) -> String {
    match action {
        EditAction::Remove { node } => format!("{} {}", "remove".red(), target(tree, *node)),
        EditAction::Update {
            element,
            attributes,
        } => {
            let changes: Vec<String> = attributes
                .iter()
                .map(|(name, value)| match value {
                    Some(value) => format!("{}=\"{}\"", name, value),
                    None => format!("-{}", name),
                })
                .collect();
            format!(
                "{} {} {}",
                "update".yellow(),
                target(tree, *element),
                changes.join(" ")
            )
        }
        EditAction::Insert {
            parent,
            node,
            reference,
        } => {
            let mut line = format!(
                "{} {} into {}",
                "insert".green(),
                fragment_summary(node),
                target(tree, *parent)
            );
            if let Some(reference) = reference {
                line.push_str(&format!(" before {}", target(tree, *reference)));
            }
            line
        }
    }
}

/// Selector of an existing element, the raw id for nodes created earlier in
/// the plan
fn target(tree: &XmlDocument, id: NodeId) -> String {
    let node = tree.node(id);
    match node.and_then(Selector::of) {
        Some(selector) => selector.to_string(),
        None if node.map_or(false, |node| node.is_text()) => format!("text {}", id),
        None => id.to_string(),
    }
}

fn fragment_summary(fragment: &Fragment) -> String {
    match &fragment.kind {
        NodeKind::Element { tag, attributes } => {
            let mut summary = format!("<{}", tag);
            for attr in attributes {
                summary.push_str(&format!(" {}=\"{}\"", attr.name, attr.value));
            }
            summary.push('>');
            summary
        }
        NodeKind::Text { text } => format!("{:?}", text),
        NodeKind::Comment { .. } => "comment".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scl_editor::Attributes;
    use scl_parser::parse;

    const SOURCE: &str = r#"<SCL><IED name="IED1"><LDevice inst="ld1"/></IED></SCL>"#;

    #[test]
    fn test_describe_actions() {
        colored::control::set_override(false);
        let tree = parse(SOURCE).unwrap();
        let ld = tree.elements_by_tag("LDevice").next().unwrap();
        let ied = tree.elements_by_tag("IED").next().unwrap();

        assert_eq!(
            describe(&tree, &EditAction::remove(ld)),
            "remove LDevice: IED1>>ld1"
        );
        assert_eq!(
            describe(
                &tree,
                &EditAction::update(ld, Attributes::from([("desc", Some("d")), ("inst", None)]))
            ),
            "update LDevice: IED1>>ld1 desc=\"d\" -inst"
        );

        let fragment = tree.create_element("LDevice", &[("inst", "ld2")]);
        let id = fragment.id;
        let insert = EditAction::insert(ied.id(), fragment, Some(ld));
        assert_eq!(
            describe(&tree, &insert),
            "insert <LDevice inst=\"ld2\"> into IED: IED1 before LDevice: IED1>>ld1"
        );
        assert_eq!(target(&tree, id), id.to_string());
    }
}

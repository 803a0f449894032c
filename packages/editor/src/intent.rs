//! # Intents
//!
//! Serializable edit requests. An intent names its targets by [`Selector`]
//! and is planned against a document into the action list of the matching
//! mutator:
//!
//! ```json
//! { "intent": "updateDataSet", "dataSet": "DataSet: IED1>>ld1>>ds", "attributes": { "name": "renamed" } }
//! ```

use scl_parser::ast::{Document, Node};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::actions::{Attributes, EditAction};
use crate::control_block::remove_control_block;
use crate::data_set::{add_data_set, remove_data_set, update_data_set};
use crate::ext_ref::unsubscribe;
use crate::fcda::{add_fcdas, add_fcdos, remove_fcdas, FcPath};
use crate::gse::{add_gse, update_gse, GseOptions, GseValues};
use crate::gse_control::{add_gse_control, update_gse_control};
use crate::identity::Selector;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntentError {
    #[error("No element matches {0}")]
    UnresolvedSelector(Selector),

    #[error("Nothing to {intent} below {parent}")]
    NoTarget {
        intent: &'static str,
        parent: Selector,
    },
}

/// A data object path with its functional constraint, by selectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FcPathSelector {
    pub path: Vec<Selector>,
    pub fc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Intent {
    RemoveControlBlock {
        control_block: Selector,
    },
    RemoveDataSet {
        data_set: Selector,
    },
    UpdateDataSet {
        data_set: Selector,
        attributes: Attributes,
    },
    AddDataSet {
        parent: Selector,
        #[serde(default)]
        attributes: Option<Attributes>,
    },
    RemoveFcdas {
        fcdas: Vec<Selector>,
    },
    /// Paths from the `LDevice` down to the data attribute
    AddFcdas {
        data_set: Selector,
        paths: Vec<Vec<Selector>>,
    },
    AddFcdos {
        data_set: Selector,
        fc_paths: Vec<FcPathSelector>,
    },
    Unsubscribe {
        ext_refs: Vec<Selector>,
    },
    UpdateGse {
        gse: Selector,
        values: GseValues,
        #[serde(default)]
        inst_type: Option<bool>,
    },
    AddGse {
        connected_ap: Selector,
        ld_inst: String,
        cb_name: String,
        #[serde(default)]
        options: GseOptions,
    },
    UpdateGseControl {
        gse_control: Selector,
        attributes: Attributes,
    },
    AddGseControl {
        parent: Selector,
        #[serde(default)]
        attributes: Option<Attributes>,
    },
}

fn resolve<'a>(doc: &'a Document, selector: &Selector) -> Result<Node<'a>, IntentError> {
    selector
        .find(doc)
        .ok_or_else(|| IntentError::UnresolvedSelector(selector.clone()))
}

fn resolve_all<'a>(doc: &'a Document, selectors: &[Selector]) -> Result<Vec<Node<'a>>, IntentError> {
    selectors
        .iter()
        .map(|selector| resolve(doc, selector))
        .collect()
}

impl Intent {
    /// The intent name as written in JSON
    pub fn name(&self) -> &'static str {
        match self {
            Intent::RemoveControlBlock { .. } => "removeControlBlock",
            Intent::RemoveDataSet { .. } => "removeDataSet",
            Intent::UpdateDataSet { .. } => "updateDataSet",
            Intent::AddDataSet { .. } => "addDataSet",
            Intent::RemoveFcdas { .. } => "removeFcdas",
            Intent::AddFcdas { .. } => "addFcdas",
            Intent::AddFcdos { .. } => "addFcdos",
            Intent::Unsubscribe { .. } => "unsubscribe",
            Intent::UpdateGse { .. } => "updateGse",
            Intent::AddGse { .. } => "addGse",
            Intent::UpdateGseControl { .. } => "updateGseControl",
            Intent::AddGseControl { .. } => "addGseControl",
        }
    }

    /// Use `inst_type` for a `updateGse` that leaves it open
    pub fn with_default_inst_type(mut self, default: Option<bool>) -> Self {
        if let Intent::UpdateGse { inst_type, .. } = &mut self {
            if inst_type.is_none() {
                *inst_type = default;
            }
        }
        self
    }

    /// Resolve the selectors against `doc` and compute the actions
    #[instrument(skip_all, fields(intent = self.name()))]
    pub fn plan(&self, doc: &Document) -> Result<Vec<EditAction>, IntentError> {
        let actions = match self {
            Intent::RemoveControlBlock { control_block } => {
                remove_control_block(resolve(doc, control_block)?)
            }
            Intent::RemoveDataSet { data_set } => remove_data_set(resolve(doc, data_set)?),
            Intent::UpdateDataSet {
                data_set,
                attributes,
            } => update_data_set(resolve(doc, data_set)?, attributes),
            Intent::AddDataSet { parent, attributes } => {
                let action = add_data_set(resolve(doc, parent)?, attributes.as_ref())
                    .ok_or_else(|| self.no_target(parent))?;
                vec![action]
            }
            Intent::RemoveFcdas { fcdas } => remove_fcdas(&resolve_all(doc, fcdas)?),
            Intent::AddFcdas { data_set, paths } => {
                let paths = paths
                    .iter()
                    .map(|path| resolve_all(doc, path))
                    .collect::<Result<Vec<_>, _>>()?;
                add_fcdas(resolve(doc, data_set)?, &paths)
            }
            Intent::AddFcdos { data_set, fc_paths } => {
                let fc_paths = fc_paths
                    .iter()
                    .map(|fc_path| {
                        Ok(FcPath {
                            path: resolve_all(doc, &fc_path.path)?,
                            fc: fc_path.fc.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, IntentError>>()?;
                add_fcdos(resolve(doc, data_set)?, &fc_paths)
            }
            Intent::Unsubscribe { ext_refs } => unsubscribe(&resolve_all(doc, ext_refs)?),
            Intent::UpdateGse {
                gse,
                values,
                inst_type,
            } => update_gse(resolve(doc, gse)?, values, *inst_type),
            Intent::AddGse {
                connected_ap,
                ld_inst,
                cb_name,
                options,
            } => add_gse(resolve(doc, connected_ap)?, ld_inst, cb_name, options),
            Intent::UpdateGseControl {
                gse_control,
                attributes,
            } => update_gse_control(resolve(doc, gse_control)?, attributes),
            Intent::AddGseControl { parent, attributes } => {
                add_gse_control(resolve(doc, parent)?, attributes.as_ref())
                    .ok_or_else(|| self.no_target(parent))?
            }
        };
        debug!(actions = actions.len(), "planned");
        Ok(actions)
    }

    fn no_target(&self, parent: &Selector) -> IntentError {
        IntentError::NoTarget {
            intent: self.name(),
            parent: parent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gse::GseField;
    use crate::identity::selector;
    use crate::scl::PType;
    use scl_parser::parse;

    const SOURCE: &str = r#"<SCL version="2007" revision="B">
        <Communication>
            <SubNetwork name="StationBus">
                <ConnectedAP iedName="IED1" apName="AP1">
                    <GSE ldInst="ld1" cbName="gse">
                        <Address>
                            <P type="MAC-Address">01-0C-CD-01-00-00</P>
                            <P type="APPID">0001</P>
                        </Address>
                        <MinTime unit="s" multiplier="m">10</MinTime>
                        <MaxTime unit="s" multiplier="m">10000</MaxTime>
                    </GSE>
                </ConnectedAP>
            </SubNetwork>
        </Communication>
        <IED name="IED1">
            <AccessPoint name="AP1"><Server><LDevice inst="ld1">
                <LN0 lnClass="LLN0" inst="">
                    <DataSet name="ds"/>
                    <GSEControl name="gse" datSet="ds"/>
                </LN0>
                <LN lnClass="MMXU" inst="1"/>
            </LDevice></Server></AccessPoint>
        </IED>
    </SCL>"#;

    fn intent(json: &str) -> Intent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_intent_json() {
        let parsed = intent(
            r#"{"intent": "updateDataSet", "dataSet": "DataSet: IED1>>ld1>>ds", "attributes": {"name": "renamed", "desc": null}}"#,
        );
        assert_eq!(
            parsed,
            Intent::UpdateDataSet {
                data_set: selector("DataSet", "IED1>>ld1>>ds"),
                attributes: Attributes::from([("name", Some("renamed")), ("desc", None)]),
            }
        );
        assert_eq!(parsed.name(), "updateDataSet");

        let gse = intent(
            r#"{"intent": "updateGse", "gse": "GSE: StationBus>IED1 AP1>ld1 gse", "values": {"APPID": "0002", "MinTime": null}}"#,
        );
        match gse {
            Intent::UpdateGse {
                values, inst_type, ..
            } => {
                assert_eq!(values.len(), 2);
                assert_eq!(values[&GseField::Address(PType::AppId)].as_deref(), Some("0002"));
                assert_eq!(values[&GseField::MinTime], None);
                assert_eq!(inst_type, None);
            }
            other => panic!("expected updateGse, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let result: Result<Intent, _> =
            serde_json::from_str(r#"{"intent": "removeDataSet", "dataSet": "no selector"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_plan_update_data_set() {
        let doc = parse(SOURCE).unwrap();
        let actions = intent(
            r#"{"intent": "updateDataSet", "dataSet": "DataSet: IED1>>ld1>>ds", "attributes": {"name": "renamed"}}"#,
        )
        .plan(&doc)
        .unwrap();

        assert_eq!(actions.len(), 2);
        let gse_control = doc.elements_by_tag("GSEControl").next().unwrap();
        assert_eq!(
            actions[1],
            EditAction::update(gse_control, Attributes::from([("datSet", Some("renamed"))]))
        );
    }

    #[test]
    fn test_plan_unresolved_selector() {
        let doc = parse(SOURCE).unwrap();
        let result = Intent::RemoveControlBlock {
            control_block: selector("GSEControl", "IED1>>ld1>>missing"),
        }
        .plan(&doc);

        assert_eq!(
            result,
            Err(IntentError::UnresolvedSelector(selector(
                "GSEControl",
                "IED1>>ld1>>missing"
            )))
        );
    }

    #[test]
    fn test_plan_no_target() {
        let doc = parse(SOURCE).unwrap();
        let ln = selector("LN", "IED1>>ld1> MMXU 1");
        let result = Intent::AddGseControl {
            parent: ln.clone(),
            attributes: None,
        }
        .plan(&doc);

        assert_eq!(
            result,
            Err(IntentError::NoTarget {
                intent: "addGseControl",
                parent: ln,
            })
        );
    }

    #[test]
    fn test_plan_add_gse_control_with_gse() {
        let doc = parse(SOURCE).unwrap();
        let actions = intent(r#"{"intent": "addGseControl", "parent": "IED: IED1"}"#)
            .plan(&doc)
            .unwrap();

        assert_eq!(actions.len(), 5);
        assert!(actions.iter().all(EditAction::is_insert));
    }

    #[test]
    fn test_default_inst_type() {
        let update = Intent::UpdateGse {
            gse: selector("GSE", "StationBus>IED1 AP1>ld1 gse"),
            values: GseValues::new(),
            inst_type: None,
        };
        match update.with_default_inst_type(Some(true)) {
            Intent::UpdateGse { inst_type, .. } => assert_eq!(inst_type, Some(true)),
            other => panic!("expected updateGse, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_update_gse() {
        let doc = parse(SOURCE).unwrap();
        let actions = intent(
            r#"{"intent": "updateGse", "gse": "GSE: StationBus>IED1 AP1>ld1 gse", "values": {"MaxTime": "2000"}}"#,
        )
        .plan(&doc)
        .unwrap();

        assert_eq!(actions.len(), 2);
        assert!(actions[0].is_insert());
        assert!(actions[1].is_remove());
    }
}

//! Reference variable parser and calculators.
//!
//! ```xml
//! <variables>
//!   <var name="x" value="500"/>
//!   <var name="rate" min="5" max="20" step="0.5" prec="1"/>
//!   <var name="tax" formula="round({x} * {rate} / 100, 2)"/>
//! </variables>
//! ```
//!
//! Fixed values, random values from a stepped range and formulas over
//! earlier variables are supported.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use quick_xml::events::Event;
use quick_xml::Reader;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use accqst_core::traits::{VariableDefinition, VariableParser};

use crate::error::ReferenceError;
use crate::formula::evaluate;
use crate::xml::{attributes, element_name};

/// How a variable obtains its value.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    Fixed(f64),
    Range { min: f64, max: f64, step: f64 },
    Formula(String),
}

/// A variable of the reference definition format.
#[derive(Debug)]
pub struct ReferenceVariable {
    name: String,
    precision: Option<u32>,
    kind: VariableKind,
    rng: Mutex<StdRng>,
}

impl ReferenceVariable {
    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }
}

impl VariableDefinition for ReferenceVariable {
    fn name(&self) -> &str {
        &self.name
    }

    fn precision(&self) -> Option<u32> {
        self.precision
    }

    fn calculate(&self, resolved: &BTreeMap<String, f64>) -> anyhow::Result<f64> {
        match &self.kind {
            VariableKind::Fixed(value) => Ok(*value),
            VariableKind::Range { min, max, step } => {
                let steps = ((max - min) / step).floor() as u64;
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                let k = rng.random_range(0..=steps);
                Ok(min + k as f64 * step)
            }
            VariableKind::Formula(formula) => Ok(evaluate(formula, resolved)?),
        }
    }
}

/// Parses `<variables>` documents.
///
/// Without a seed every parse draws fresh random values; a seeded parser
/// is reproducible.
#[derive(Debug, Clone, Default)]
pub struct ReferenceVariableParser {
    seed: Option<u64>,
}

impl ReferenceVariableParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    fn rng_for(&self, index: usize) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_os_rng(),
        }
    }

    fn variable(
        &self,
        index: usize,
        attrs: &BTreeMap<String, String>,
    ) -> Result<ReferenceVariable, ReferenceError> {
        let name = attrs
            .get("name")
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ReferenceError::Definition(format!("variable {} has no name", index + 1)))?;

        let number = |key: &str| -> Result<Option<f64>, ReferenceError> {
            attrs
                .get(key)
                .map(|raw| {
                    raw.trim().parse::<f64>().map_err(|_| {
                        ReferenceError::Definition(format!("{name}: {key}='{raw}' is not a number"))
                    })
                })
                .transpose()
        };

        let kind = if let Some(formula) = attrs.get("formula") {
            VariableKind::Formula(formula.clone())
        } else if let Some(value) = number("value")? {
            VariableKind::Fixed(value)
        } else {
            match (number("min")?, number("max")?) {
                (Some(min), Some(max)) if min <= max => {
                    let step = number("step")?.unwrap_or(1.0);
                    if step <= 0.0 {
                        return Err(ReferenceError::Definition(format!(
                            "{name}: step must be positive"
                        )));
                    }
                    VariableKind::Range { min, max, step }
                }
                (Some(_), Some(_)) => {
                    return Err(ReferenceError::Definition(format!(
                        "{name}: min is greater than max"
                    )))
                }
                _ => {
                    return Err(ReferenceError::Definition(format!(
                        "{name}: needs value, formula or min and max"
                    )))
                }
            }
        };

        let precision = attrs
            .get("prec")
            .map(|raw| {
                raw.trim().parse::<u32>().map_err(|_| {
                    ReferenceError::Definition(format!("{name}: prec='{raw}' is not a count"))
                })
            })
            .transpose()?;

        Ok(ReferenceVariable {
            rng: Mutex::new(self.rng_for(index)),
            name,
            precision,
            kind,
        })
    }
}

impl VariableParser for ReferenceVariableParser {
    fn parse(&self, xml: &str) -> anyhow::Result<Vec<Arc<dyn VariableDefinition>>> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let decoder = reader.decoder();

        let mut depth = 0usize;
        let mut seen_root = false;
        let mut names = HashSet::new();
        let mut variables: Vec<Arc<dyn VariableDefinition>> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                ReferenceError::Definition(format!("position {}: {e}", reader.error_position()))
            })?;
            let (element, opens) = match event {
                Event::Start(element) => (element, true),
                Event::Empty(element) => (element, false),
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            let name = element_name(&element);
            if depth == 0 {
                if name != "variables" {
                    return Err(ReferenceError::Definition(format!(
                        "root element must be <variables>, found <{name}>"
                    ))
                    .into());
                }
                seen_root = true;
            } else if depth == 1 && name == "var" {
                let attrs = attributes(&element, decoder).map_err(ReferenceError::Definition)?;
                let variable = self.variable(variables.len(), &attrs)?;
                if !names.insert(variable.name.clone()) {
                    return Err(ReferenceError::Definition(format!(
                        "variable {} is defined twice",
                        variable.name
                    ))
                    .into());
                }
                variables.push(Arc::new(variable));
            }
            if opens {
                depth += 1;
            }
        }

        if !seen_root {
            return Err(ReferenceError::Definition("document has no root element".into()).into());
        }
        if depth != 0 {
            return Err(ReferenceError::Definition("unexpected end of document".into()).into());
        }
        tracing::debug!(variables = variables.len(), "variable definition parsed");
        Ok(variables)
    }
}

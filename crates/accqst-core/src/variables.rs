//! Randomized question variables.
//!
//! The engine owns the variables of one question: it asks a
//! [`VariableParser`] for definitions, calculates or restores their values
//! and substitutes `{name}` tokens in question, part and booking text.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::AccqstError;
use crate::model::{SolutionRecord, SubstitutionMode, VARS_KEY};
use crate::numeric::{format_plain, DisplayFormat};
use crate::traits::{VariableDefinition, VariableParser};

/// A named variable and its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    /// Decimal places for display; falls back to the question precision.
    pub precision: Option<u32>,
    /// `None` until calculated or restored.
    pub value: Option<f64>,
}

impl Variable {
    /// Full precision with `.` decimals.
    pub fn numeric(&self) -> Option<String> {
        self.value.map(format_plain)
    }

    /// Rounded in the configured number format.
    pub fn display(&self, format: &DisplayFormat) -> Option<String> {
        let precision = self.precision.unwrap_or(format.precision);
        self.value.map(|v| format.number.format(v, precision))
    }

    /// Plain value with `,` decimals.
    pub fn default_string(&self) -> Option<String> {
        self.value.map(|v| format_plain(v).replace('.', ","))
    }

    pub fn render(&self, mode: SubstitutionMode, format: &DisplayFormat) -> Option<String> {
        match mode {
            SubstitutionMode::Numeric => self.numeric(),
            SubstitutionMode::Display => self.display(format),
            SubstitutionMode::Default => self.default_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    definition: Arc<dyn VariableDefinition>,
    variable: Variable,
}

/// Owns the variables of one question for one session.
#[derive(Debug, Clone, Default)]
pub struct VariableEngine {
    definition: String,
    slots: Vec<Slot>,
    format: DisplayFormat,
    analyze_error: Option<String>,
}

impl VariableEngine {
    pub fn new(format: DisplayFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    pub fn display_format(&self) -> DisplayFormat {
        self.format
    }

    pub fn set_display_format(&mut self, format: DisplayFormat) {
        self.format = format;
    }

    /// Parse a variable definition, replacing all current variables.
    ///
    /// A blank definition yields no variables. On failure the previous
    /// variables stay in place and the parser's message is kept for
    /// [`analyze_error`](Self::analyze_error).
    pub fn set_definition(
        &mut self,
        xml: &str,
        parser: &dyn VariableParser,
    ) -> Result<(), AccqstError> {
        let definitions = if xml.trim().is_empty() {
            Vec::new()
        } else {
            match parser.parse(xml) {
                Ok(definitions) => definitions,
                Err(e) => {
                    let message = format!("{e:#}");
                    self.analyze_error = Some(message.clone());
                    return Err(AccqstError::VariableDefinition(message));
                }
            }
        };

        self.definition = xml.to_string();
        self.slots = definitions
            .into_iter()
            .map(|definition| Slot {
                variable: Variable {
                    name: definition.name().to_string(),
                    precision: definition.precision(),
                    value: None,
                },
                definition,
            })
            .collect();
        self.analyze_error = None;
        Ok(())
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn analyze_error(&self) -> Option<&str> {
        self.analyze_error.as_deref()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.slots.iter().map(|slot| &slot.variable)
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables().find(|v| v.name == name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every defined variable has a value.
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|slot| slot.variable.value.is_some())
    }

    /// Calculate every variable in definition order.
    ///
    /// Each definition sees the values calculated before it in this call.
    /// Values are only committed when all variables succeed; the first
    /// failure stops the calculation.
    pub fn calculate_all(&mut self) -> Result<(), AccqstError> {
        let mut resolved: BTreeMap<String, f64> = BTreeMap::new();

        for slot in &self.slots {
            let name = slot.variable.name.clone();
            let reason = match slot.definition.calculate(&resolved) {
                Ok(value) if value.is_finite() => {
                    resolved.insert(name, value);
                    continue;
                }
                Ok(value) => format!("result {value} is not a finite number"),
                Err(e) => format!("{e:#}"),
            };
            let err = AccqstError::VariableCalculation { name, reason };
            self.analyze_error = Some(err.to_string());
            return Err(err);
        }

        for slot in &mut self.slots {
            slot.variable.value = resolved.get(&slot.variable.name).copied();
        }
        tracing::debug!(variables = self.slots.len(), "variables calculated");
        Ok(())
    }

    /// Restore values from a stored solution, calculating when incomplete.
    ///
    /// Returns `Ok(true)` when the stored map held a value for every
    /// defined variable. Otherwise all variables are calculated so that
    /// none is left undefined.
    pub fn resolve_from_stored_or_calculate(
        &mut self,
        stored: &SolutionRecord,
    ) -> Result<bool, AccqstError> {
        let restored = stored.get(VARS_KEY).and_then(|raw| {
            let values = parse_stored_values(raw);
            if values.is_none() {
                tracing::warn!("stored variable map is unreadable, recalculating");
            }
            values
        });
        // Stored values are only committed when they cover every variable.
        let complete = restored.as_ref().is_some_and(|values| {
            self.slots
                .iter()
                .all(|slot| values.contains_key(&slot.variable.name))
        });

        match restored {
            Some(values) if complete => {
                for slot in &mut self.slots {
                    slot.variable.value = values.get(&slot.variable.name).copied();
                }
            }
            _ => self.calculate_all()?,
        }
        Ok(complete)
    }

    /// Replace every `{name}` token with the variable's rendering.
    ///
    /// Variables are visited once in definition order; replacement text is
    /// never substituted again. Variables without a value are left as
    /// tokens.
    pub fn substitute(&self, text: &str, mode: SubstitutionMode) -> String {
        let mut out = text.to_string();
        for slot in &self.slots {
            let token = format!("{{{}}}", slot.variable.name);
            if !out.contains(&token) {
                continue;
            }
            if let Some(rendered) = slot.variable.render(mode, &self.format) {
                out = out.replace(&token, &rendered);
            }
        }
        out
    }

    /// Variable values as `name -> numeric string`.
    pub fn serialize(&self) -> BTreeMap<String, String> {
        self.slots
            .iter()
            .filter_map(|slot| {
                slot.variable
                    .numeric()
                    .map(|value| (slot.variable.name.clone(), value))
            })
            .collect()
    }

    /// The serialized map as stored under [`VARS_KEY`].
    pub fn stored_value(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .serialize()
            .into_iter()
            .map(|(name, value)| (name, serde_json::Value::String(value)))
            .collect();
        serde_json::Value::Object(map).to_string()
    }
}

/// Accepts both string and number values.
fn parse_stored_values(raw: &str) -> Option<BTreeMap<String, f64>> {
    let map: BTreeMap<String, serde_json::Value> = serde_json::from_str(raw).ok()?;
    let mut values = BTreeMap::new();
    for (name, value) in map {
        let number = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        if let Some(number) = number {
            values.insert(name, number);
        }
    }
    Some(values)
}

//! Capability advertisement: what the worker can do, sent once when the
//! event stream opens (`spec.md` §3, invariant I5).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::toolchain::{Provider, Toolchain};

/// An advertised endpoint of a provider: a name and arbitrary parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

impl Target {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// One registered bridge handler's advertised capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigType {
    pub toolchain: Toolchain,
    pub provider: Provider,
    pub available_targets: Vec<Target>,
}

/// The signature of one invocable function. The function body execution
/// engine is an external collaborator (`spec.md` §1); this is only the
/// shape a caller needs to see to invoke it correctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

/// Per-toolchain function-name to signature mapping for one function
/// handler.
pub type FunctionCapability = HashMap<Toolchain, HashMap<String, FunctionSignature>>;

/// The aggregate capability advertisement sent on stream open: the union of
/// every registered handler's capability (`spec.md` §3, I5).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    #[serde(default)]
    pub config_types: Vec<ConfigType>,
    #[serde(default)]
    pub functions: FunctionCapability,
}

impl Capability {
    #[must_use]
    pub fn merge(mut self, other: Capability) -> Self {
        self.config_types.extend(other.config_types);
        for (toolchain, fns) in other.functions {
            self.functions.entry(toolchain).or_default().extend(fns);
        }
        self
    }
}

//! Policy document types and their compiled, evaluable form.
//!
//! A `PolicySpec` is deserialized from TOML or JSON. `compile` validates it
//! and produces a `CompiledPolicy`; anything that could not be evaluated at
//! query time is rejected here.
//!
//! Example in TOML:
//! ```toml
//! [[policies]]
//! id = "psychiatry-technicians"
//! description = "Psychiatric technicians at hospital A can access psychiatry records"
//! effect = "allow"
//!
//! [policies.rules]
//! action = [{ "$.method" = { condition = "Equals", value = "read" } }]
//!
//! [policies.rules.subject]
//! "$.org" = { condition = "Equals", value = "A" }
//! "$.role" = { condition = "Equals", value = "technician" }
//! "$.dept" = { condition = "Equals", value = "psychiatry" }
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use medirag_contracts::{
    access::AccessRequest,
    attributes::AttributeMap,
    error::{MediragError, MediragResult},
};

/// What a policy grants when its rules match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

/// A single policy as written in a policy document.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicySpec {
    /// Stable identifier; must be unique within one store.
    #[serde(alias = "uid")]
    pub id: String,

    #[serde(default)]
    pub description: String,

    pub effect: Effect,

    /// Retained for future tie-breaking. Allow-overrides ignores it.
    #[serde(default)]
    pub priority: i64,

    #[serde(default)]
    pub rules: RulesSpec,

    /// Retained for compatibility with existing policy documents; unused.
    #[serde(default)]
    pub targets: Value,
}

/// Predicates over each of the four parts of an access request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesSpec {
    #[serde(default)]
    pub subject: RuleBlockSpec,
    #[serde(default)]
    pub resource: RuleBlockSpec,
    #[serde(default)]
    pub action: RuleBlockSpec,
    #[serde(default)]
    pub context: RuleBlockSpec,
}

/// Predicates for one request part.
///
/// A map is a conjunction of predicates keyed by attribute path. A list of
/// maps is a disjunction of such conjunctions.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RuleBlockSpec {
    All(BTreeMap<String, ConditionSpec>),
    AnyOf(Vec<BTreeMap<String, ConditionSpec>>),
}

impl Default for RuleBlockSpec {
    fn default() -> Self {
        RuleBlockSpec::All(BTreeMap::new())
    }
}

/// One condition on an attribute, as written in a policy document.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "condition")]
pub enum ConditionSpec {
    /// The attribute equals `value`.
    Equals { value: Value },
    /// The attribute is one of `values`.
    IsIn { values: Vec<Value> },
    /// The attribute is a list with at least one element in `values`.
    AnyIn { values: Vec<Value> },
}

// ── Compiled form ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Condition {
    Equals(Value),
    IsIn(Vec<Value>),
    AnyIn(Vec<Value>),
}

impl Condition {
    fn holds(&self, attribute: &Value) -> bool {
        match self {
            Condition::Equals(expected) => attribute == expected,
            Condition::IsIn(values) => values.contains(attribute),
            Condition::AnyIn(values) => attribute
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values.contains(item))),
        }
    }
}

#[derive(Debug, Clone)]
struct Predicate {
    path: Vec<String>,
    condition: Condition,
}

impl Predicate {
    /// A missing attribute never satisfies a predicate.
    fn matches(&self, attributes: &AttributeMap) -> bool {
        resolve(attributes, &self.path).is_some_and(|value| self.condition.holds(value))
    }
}

/// Disjunction of conjunctions. A single empty conjunction always matches.
#[derive(Debug, Clone)]
struct Block(Vec<Vec<Predicate>>);

impl Block {
    fn matches(&self, attributes: &AttributeMap) -> bool {
        self.0
            .iter()
            .any(|conjunction| conjunction.iter().all(|p| p.matches(attributes)))
    }
}

/// A validated policy ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    id: String,
    description: String,
    effect: Effect,
    priority: i64,
    subject: Block,
    resource: Block,
    action: Block,
    context: Block,
}

impl CompiledPolicy {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Return true when every part of `request` satisfies this policy's rules.
    pub fn matches(&self, request: &AccessRequest) -> bool {
        self.subject.matches(&request.subject.attributes)
            && self.resource.matches(&request.resource.attributes)
            && self.action.matches(&request.action.attributes)
            && self.context.matches(&request.context)
    }
}

/// Validate `spec` and compile it into an evaluable policy.
pub fn compile(spec: PolicySpec) -> MediragResult<CompiledPolicy> {
    if spec.id.trim().is_empty() {
        return Err(config_error("policy id must not be empty"));
    }
    let id = spec.id;
    let block = |part: &str, block: RuleBlockSpec| {
        compile_block(block).map_err(|reason| {
            config_error(format!("policy '{}' {} rules: {}", id, part, reason))
        })
    };

    Ok(CompiledPolicy {
        subject: block("subject", spec.rules.subject)?,
        resource: block("resource", spec.rules.resource)?,
        action: block("action", spec.rules.action)?,
        context: block("context", spec.rules.context)?,
        id: id.clone(),
        description: spec.description,
        effect: spec.effect,
        priority: spec.priority,
    })
}

fn compile_block(spec: RuleBlockSpec) -> Result<Block, String> {
    let conjunctions = match spec {
        RuleBlockSpec::All(map) => vec![map],
        RuleBlockSpec::AnyOf(list) if list.is_empty() => {
            return Err("an empty list of alternatives can never match".to_string())
        }
        RuleBlockSpec::AnyOf(list) => list,
    };

    conjunctions
        .into_iter()
        .map(|map| {
            map.into_iter()
                .map(|(path, condition)| compile_predicate(&path, condition))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Block)
}

fn compile_predicate(path: &str, spec: ConditionSpec) -> Result<Predicate, String> {
    let segments = parse_path(path)?;
    let condition = match spec {
        ConditionSpec::Equals { value } => {
            if value.is_object() || value.is_array() || value.is_null() {
                return Err(format!("'{}': Equals needs a scalar value, got {}", path, value));
            }
            Condition::Equals(value)
        }
        ConditionSpec::IsIn { values } => {
            if values.is_empty() {
                return Err(format!("'{}': IsIn needs at least one value", path));
            }
            Condition::IsIn(values)
        }
        ConditionSpec::AnyIn { values } => {
            if values.is_empty() {
                return Err(format!("'{}': AnyIn needs at least one value", path));
            }
            Condition::AnyIn(values)
        }
    };
    Ok(Predicate { path: segments, condition })
}

/// Parse an attribute path such as `org`, `$.org`, or `$.address.city`.
fn parse_path(path: &str) -> Result<Vec<String>, String> {
    let trimmed = path.strip_prefix("$.").unwrap_or(path);
    let segments: Vec<String> = trimmed.split('.').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty() || s.starts_with('$')) {
        return Err(format!("invalid attribute path '{}'", path));
    }
    Ok(segments)
}

fn resolve<'a>(attributes: &'a AttributeMap, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(attributes.get(first)?, |value, segment| value.get(segment))
}

fn config_error(reason: impl Into<String>) -> MediragError {
    MediragError::PolicyConfiguration { reason: reason.into() }
}

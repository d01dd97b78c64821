//! ComfyUI API-format workflows.
//!
//! An API-format workflow is a JSON object keyed by node id:
//! `{ "3": { "class_type": "KSampler", "inputs": { "model": ["4", 0], ... } } }`.
//! Inputs that are two-element arrays are links `[source_node_id, output_index]`.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GenError, GenResult};

/// A link whose source node does not exist in the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    pub node_id: String,
    pub input: String,
    pub target: String,
}

impl fmt::Display for BrokenLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node {}: input '{}' references non-existent node {}",
            self.node_id, self.input, self.target
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    nodes: Map<String, Value>,
}

impl Workflow {
    pub fn from_value(value: Value) -> GenResult<Self> {
        let Value::Object(nodes) = value else {
            return Err(GenError::workflow("workflow must be a JSON object keyed by node id"));
        };
        for (id, node) in &nodes {
            if !node.is_object() {
                return Err(GenError::workflow(format!("node {id} is not an object")));
            }
        }
        Ok(Self { nodes })
    }

    pub fn load(path: impl AsRef<Path>) -> GenResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| GenError::workflow(format!("cannot read {}: {e}", path.display())))?;
        let value: Value = serde_json::from_str(&raw)?;
        Self::from_value(value)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Distinct `class_type` values used by the workflow.
    pub fn class_types(&self) -> BTreeSet<String> {
        self.nodes
            .values()
            .filter_map(|n| n.get("class_type").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    pub fn get_input(&self, node_id: &str, input: &str) -> Option<&Value> {
        self.nodes.get(node_id)?.get("inputs")?.get(input)
    }

    /// Set `inputs.<input>` on a node. The node must exist.
    pub fn set_input(&mut self, node_id: &str, input: &str, value: Value) -> GenResult<()> {
        let node = self
            .nodes
            .get_mut(node_id)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| GenError::workflow(format!("node {node_id} not found")))?;

        let inputs = node
            .entry("inputs")
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(inputs) = inputs.as_object_mut() else {
            return Err(GenError::workflow(format!("node {node_id} has non-object inputs")));
        };
        inputs.insert(input.to_string(), value);
        Ok(())
    }

    /// Every link input whose source node is missing.
    pub fn verify_connections(&self) -> Vec<BrokenLink> {
        let mut broken = Vec::new();
        for (node_id, node) in &self.nodes {
            let Some(inputs) = node.get("inputs").and_then(Value::as_object) else {
                continue;
            };
            for (input, value) in inputs {
                let Some(link) = value.as_array().filter(|a| a.len() == 2) else {
                    continue;
                };
                let target = match &link[0] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if !self.nodes.contains_key(&target) {
                    broken.push(BrokenLink {
                        node_id: node_id.clone(),
                        input: input.clone(),
                        target,
                    });
                }
            }
        }
        broken
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.nodes.clone())
    }
}

/// Maps logical generation fields to `"<node_id>.<input_name>"` targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowBindings {
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub start_image: Option<String>,
    pub end_image: Option<String>,
    pub seed: Option<String>,
    pub frame_count: Option<String>,
    pub fps: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub filename_prefix: Option<String>,
}

/// Values substituted into a workflow for one generation.
#[derive(Debug, Clone, Default)]
pub struct BindingValues {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub start_image: Option<String>,
    pub end_image: Option<String>,
    pub seed: Option<u64>,
    pub frame_count: u32,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub filename_prefix: String,
}

impl WorkflowBindings {
    fn targets(&self) -> [(&'static str, Option<&str>); 10] {
        [
            ("prompt", self.prompt.as_deref()),
            ("negative_prompt", self.negative_prompt.as_deref()),
            ("start_image", self.start_image.as_deref()),
            ("end_image", self.end_image.as_deref()),
            ("seed", self.seed.as_deref()),
            ("frame_count", self.frame_count.as_deref()),
            ("fps", self.fps.as_deref()),
            ("width", self.width.as_deref()),
            ("height", self.height.as_deref()),
            ("filename_prefix", self.filename_prefix.as_deref()),
        ]
    }

    /// Check every bound target is well-formed and names an existing node.
    pub fn validate(&self, workflow: &Workflow) -> GenResult<()> {
        for (field, target) in self.targets() {
            if let Some(target) = target {
                let (node, _) = parse_target(field, target)?;
                if !workflow.contains(node) {
                    return Err(GenError::binding(field, target, "node not found in workflow"));
                }
            }
        }
        Ok(())
    }

    /// Patch `workflow` with `values`. Unbound fields and absent optional
    /// values leave the workflow untouched.
    pub fn apply(&self, workflow: &mut Workflow, values: &BindingValues) -> GenResult<()> {
        let patches: [(&str, Option<&String>, Option<Value>); 10] = [
            ("prompt", self.prompt.as_ref(), Some(Value::from(values.prompt.as_str()))),
            (
                "negative_prompt",
                self.negative_prompt.as_ref(),
                values.negative_prompt.as_deref().map(Value::from),
            ),
            ("start_image", self.start_image.as_ref(), values.start_image.as_deref().map(Value::from)),
            ("end_image", self.end_image.as_ref(), values.end_image.as_deref().map(Value::from)),
            ("seed", self.seed.as_ref(), values.seed.map(Value::from)),
            ("frame_count", self.frame_count.as_ref(), Some(Value::from(values.frame_count))),
            ("fps", self.fps.as_ref(), Some(Value::from(values.fps))),
            ("width", self.width.as_ref(), Some(Value::from(values.width))),
            ("height", self.height.as_ref(), Some(Value::from(values.height))),
            (
                "filename_prefix",
                self.filename_prefix.as_ref(),
                Some(Value::from(values.filename_prefix.as_str())),
            ),
        ];

        for (field, target, value) in patches {
            let (Some(target), Some(value)) = (target, value) else {
                continue;
            };
            let (node, input) = parse_target(field, target)?;
            if !workflow.contains(node) {
                return Err(GenError::binding(field, target, "node not found in workflow"));
            }
            workflow.set_input(node, input, value)?;
        }
        Ok(())
    }

    /// Seed currently stored at the bound seed input, if numeric.
    pub fn current_seed(&self, workflow: &Workflow) -> Option<u64> {
        let (node, input) = self.seed.as_deref()?.split_once('.')?;
        workflow.get_input(node, input)?.as_u64()
    }
}

fn parse_target<'a>(field: &str, target: &'a str) -> GenResult<(&'a str, &'a str)> {
    match target.split_once('.') {
        Some((node, input)) if !node.is_empty() && !input.is_empty() => Ok((node, input)),
        _ => Err(GenError::binding(field, target, "expected <node_id>.<input_name>")),
    }
}

//! Job and Step model
//!
//! Builders for the jobs the compiler emits. Key order inside the emitted
//! mappings is fixed here so the lock file is stable:
//!
//! - step: `name`, `id`, `if`, `continue-on-error`, `uses`, `with`, `env`, `run`
//! - job: `name`, `needs`, `if`, `runs-on`, `environment`, `permissions`,
//!   `concurrency`, `timeout-minutes`, `env`, `outputs`, `steps`

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use crate::permissions::Permissions;
use crate::util::OrderedMap;

/// One workflow step
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Step {
    pub name: Option<String>,
    pub id: Option<String>,
    pub condition: Option<String>,
    pub continue_on_error: bool,
    pub uses: Option<String>,
    pub with: OrderedMap<String, Value>,
    pub env: BTreeMap<String, String>,
    pub run: Option<String>,
    /// User-provided step, emitted verbatim
    pub raw: Option<Value>,
}

impl Step {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Wrap a step declared by the user
    pub fn raw(value: Value) -> Self {
        Self {
            raw: Some(value),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    pub fn uses(mut self, action: impl Into<String>) -> Self {
        self.uses = Some(action.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    pub fn run(mut self, script: impl Into<String>) -> Self {
        self.run = Some(script.into());
        self
    }

    /// Action referenced by `uses:` (raw steps included)
    pub fn action(&self) -> Option<&str> {
        match &self.raw {
            Some(raw) => raw.get("uses").and_then(Value::as_str),
            None => self.uses.as_deref(),
        }
    }

    pub fn step_id(&self) -> Option<&str> {
        match &self.raw {
            Some(raw) => raw.get("id").and_then(Value::as_str),
            None => self.id.as_deref(),
        }
    }

    pub fn to_yaml(&self) -> Value {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let mut m = Mapping::new();
        if let Some(name) = &self.name {
            m.insert("name".into(), name.as_str().into());
        }
        if let Some(id) = &self.id {
            m.insert("id".into(), id.as_str().into());
        }
        if let Some(cond) = &self.condition {
            m.insert("if".into(), cond.as_str().into());
        }
        if self.continue_on_error {
            m.insert("continue-on-error".into(), true.into());
        }
        if let Some(uses) = &self.uses {
            m.insert("uses".into(), uses.as_str().into());
        }
        if !self.with.is_empty() {
            let with: Mapping = self
                .with
                .iter()
                .map(|(k, v)| (Value::from(k.as_str()), v.clone()))
                .collect();
            m.insert("with".into(), Value::Mapping(with));
        }
        if !self.env.is_empty() {
            m.insert("env".into(), string_map(&self.env));
        }
        if let Some(run) = &self.run {
            m.insert("run".into(), run.as_str().into());
        }
        Value::Mapping(m)
    }
}

/// One job of the lock file
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub name: Option<String>,
    pub needs: Vec<String>,
    pub condition: Option<String>,
    pub runs_on: Value,
    pub environment: Option<Value>,
    pub permissions: Permissions,
    pub concurrency: Option<Value>,
    pub timeout_minutes: Option<u32>,
    pub env: BTreeMap<String, String>,
    pub outputs: OrderedMap<String, String>,
    pub steps: Vec<Step>,
}

impl Job {
    pub fn new(id: impl Into<String>, runs_on: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            name: None,
            needs: Vec::new(),
            condition: None,
            runs_on: runs_on.into(),
            environment: None,
            permissions: Permissions::new(),
            concurrency: None,
            timeout_minutes: None,
            env: BTreeMap::new(),
            outputs: OrderedMap::new(),
            steps: Vec::new(),
        }
    }

    pub fn needs(mut self, job: impl Into<String>) -> Self {
        self.needs.push(job.into());
        self
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn timeout(mut self, minutes: u32) -> Self {
        self.timeout_minutes = Some(minutes);
        self
    }

    pub fn output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn add_steps(&mut self, steps: impl IntoIterator<Item = Step>) {
        self.steps.extend(steps);
    }

    /// Index of the first step with this id
    pub fn step_position(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.step_id() == Some(id))
    }

    pub fn to_yaml(&self) -> Value {
        let mut m = Mapping::new();
        if let Some(name) = &self.name {
            m.insert("name".into(), name.as_str().into());
        }
        match self.needs.len() {
            0 => {}
            1 => {
                m.insert("needs".into(), self.needs[0].as_str().into());
            }
            _ => {
                let needs: Vec<Value> = self.needs.iter().map(|n| n.as_str().into()).collect();
                m.insert("needs".into(), Value::Sequence(needs));
            }
        }
        if let Some(cond) = &self.condition {
            m.insert("if".into(), cond.as_str().into());
        }
        m.insert("runs-on".into(), self.runs_on.clone());
        if let Some(env) = &self.environment {
            m.insert("environment".into(), env.clone());
        }
        m.insert("permissions".into(), self.permissions.to_yaml());
        if let Some(c) = &self.concurrency {
            m.insert("concurrency".into(), c.clone());
        }
        if let Some(t) = self.timeout_minutes {
            m.insert("timeout-minutes".into(), t.into());
        }
        if !self.env.is_empty() {
            m.insert("env".into(), string_map(&self.env));
        }
        if !self.outputs.is_empty() {
            let outputs: Mapping = self
                .outputs
                .iter()
                .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
                .collect();
            m.insert("outputs".into(), Value::Mapping(outputs));
        }
        let steps: Vec<Value> = self.steps.iter().map(Step::to_yaml).collect();
        m.insert("steps".into(), Value::Sequence(steps));
        Value::Mapping(m)
    }
}

fn string_map(map: &BTreeMap<String, String>) -> Value {
    Value::Mapping(
        map.iter()
            .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
            .collect(),
    )
}

//! Input routing model: port lookup, confirmed selection and per-port
//! feedback.
//!
//! Selection only changes when the display confirms it with a
//! `source.select` line. Requests never write it.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use planar_core::error::{Error, Result};

use crate::inputs::InputPort;

/// What changed when a `source.select` confirmation was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    /// 1-based number of the newly selected port.
    pub number: usize,
    pub key: String,
    /// Per-port feedback values that flipped, in port order.
    pub feedback: Vec<(String, bool)>,
}

#[derive(Debug)]
pub struct InputRouter {
    ports: Vec<InputPort>,
    /// 0-based index of the confirmed port.
    current: Option<usize>,
    feedback: HashMap<String, bool>,
}

impl InputRouter {
    /// Build a router over `ports`. Keys and feedback tokens must be unique.
    pub fn new(ports: Vec<InputPort>) -> Result<Self> {
        validate(&ports)?;

        let feedback = ports.iter().map(|p| (p.key.clone(), false)).collect();
        Ok(InputRouter {
            ports,
            current: None,
            feedback,
        })
    }

    pub fn ports(&self) -> &[InputPort] {
        &self.ports
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Resolve a 1-based input number.
    ///
    /// Accepts `1..port_count` exclusive: the last port of the table cannot
    /// be reached by number, only by key.
    pub fn resolve_number(&self, number: usize) -> Option<&InputPort> {
        if number == 0 || number >= self.ports.len() {
            return None;
        }
        self.ports.get(number - 1)
    }

    pub fn find_key(&self, key: &str) -> Option<&InputPort> {
        self.ports.iter().find(|p| p.key == key)
    }

    pub fn current_port(&self) -> Option<&InputPort> {
        self.current.and_then(|idx| self.ports.get(idx))
    }

    pub fn current_key(&self) -> Option<&str> {
        self.current_port().map(|p| p.key.as_str())
    }

    /// 1-based number of the confirmed port, 0 when none is known.
    pub fn current_number(&self) -> usize {
        self.current.map_or(0, |idx| idx + 1)
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.feedback.get(key).copied().unwrap_or(false)
    }

    /// Per-port feedback in port order.
    pub fn feedback(&self) -> Vec<(String, bool)> {
        self.ports
            .iter()
            .map(|p| (p.key.clone(), self.is_selected(&p.key)))
            .collect()
    }

    /// Apply a `source.select` value reported by the display.
    ///
    /// Returns `None` when the token matches no port or names the port that
    /// is already current.
    pub fn confirm(&mut self, value: &str) -> Option<SelectionChange> {
        let token = value.trim().to_ascii_lowercase();
        let Some(idx) = self.ports.iter().position(|p| p.feedback_token == token) else {
            debug!(token = %token, "source.select matches no port");
            return None;
        };

        if self.current == Some(idx) {
            return None;
        }
        self.current = Some(idx);

        let mut flipped = Vec::new();
        for (i, port) in self.ports.iter().enumerate() {
            let selected = i == idx;
            let previous = self.feedback.insert(port.key.clone(), selected);
            if previous != Some(selected) {
                flipped.push((port.key.clone(), selected));
            }
        }

        Some(SelectionChange {
            number: idx + 1,
            key: self.ports[idx].key.clone(),
            feedback: flipped,
        })
    }
}

fn validate(ports: &[InputPort]) -> Result<()> {
    if ports.is_empty() {
        return Err(Error::Config("port table is empty".into()));
    }

    let mut keys = HashSet::new();
    let mut tokens = HashSet::new();
    for port in ports {
        if !keys.insert(port.key.as_str()) {
            return Err(Error::Config(format!("duplicate port key: {}", port.key)));
        }
        if !tokens.insert(port.feedback_token.as_str()) {
            return Err(Error::Config(format!(
                "duplicate feedback token: {}",
                port.feedback_token
            )));
        }
    }
    Ok(())
}

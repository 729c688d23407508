use serde::{Deserialize, Serialize};

/// Declares one port on a node. `exec` distinguishes control-flow ports
/// (the `exec_` naming convention, GLOSSARY) from data ports — the
/// declaration is authoritative; the engine's own naming check is only a
/// fallback for bypass routing (§4.1 step 5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDef {
  pub name: String,
  pub exec: bool,
}

impl PortDef {
  pub fn data(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      exec: false,
    }
  }

  pub fn exec(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      exec: true,
    }
  }
}

/// The full port schema a `NodeInstance` declares for itself. Used by the
/// loader's dispatch-time check and by bypass routing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSchema {
  pub inputs: Vec<PortDef>,
  pub outputs: Vec<PortDef>,
}

impl PortSchema {
  pub fn has_output(&self, name: &str) -> bool {
    self.outputs.iter().any(|p| p.name == name)
  }
}

use serde::Deserialize;
use serde::Serialize;

/// Accumulates human-readable problems found while resolving or converting a
/// declaration graph. Errors mean the surrounding operation produced an
/// incomplete result; warnings mean it degraded gracefully.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct Diagnostics {
  errors: Vec<String>,
  warnings: Vec<String>,
}

impl Diagnostics {
  pub fn new() -> Diagnostics {
    Diagnostics::default()
  }

  pub fn add_error(&mut self, msg: impl Into<String>) {
    self.errors.push(msg.into());
  }

  pub fn add_warning(&mut self, msg: impl Into<String>) {
    self.warnings.push(msg.into());
  }

  pub fn errors(&self) -> &[String] {
    &self.errors
  }

  pub fn warnings(&self) -> &[String] {
    &self.warnings
  }

  pub fn has_errors(&self) -> bool {
    !self.errors.is_empty()
  }

  pub fn append(&mut self, other: &Diagnostics) {
    self.errors.extend(other.errors.iter().cloned());
    self.warnings.extend(other.warnings.iter().cloned());
  }

  /// One line per problem, errors first.
  pub fn to_display_string(&self) -> String {
    let mut out = String::new();
    for e in &self.errors {
      out.push_str("error: ");
      out.push_str(e);
      out.push('\n');
    }
    for w in &self.warnings {
      out.push_str("warning: ");
      out.push_str(w);
      out.push('\n');
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn collects_and_formats() {
    let mut diag = Diagnostics::new();
    diag.add_warning("treating 'struct missing' as pointer to opaque type");
    assert!(!diag.has_errors());
    diag.add_error("failed to resolve name 'DWORD'");
    assert!(diag.has_errors());

    let mut other = Diagnostics::new();
    other.add_error("duplicate name");
    diag.append(&other);
    assert_eq!(diag.errors().len(), 2);

    let text = diag.to_display_string();
    assert!(text.starts_with("error: failed to resolve name 'DWORD'\n"));
    assert!(text.contains("warning: treating"));
  }
}

use crate::kind::NameKind;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Fully qualified global name: the bare identifier plus the namespace it
/// lives in. Two declarations may share an identifier as long as their kinds
/// differ (e.g. a struct and a procedure).
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Name {
  pub name: String,
  pub kind: NameKind,
}

impl Name {
  pub fn new(name: impl Into<String>, kind: NameKind) -> Name {
    Name {
      name: name.into(),
      kind,
    }
  }
}

impl Display for Name {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.kind)
  }
}

static NEXT_ANONYMOUS: AtomicU64 = AtomicU64::new(0);

const ANONYMOUS_PREFIX: &str = "Anonymous_";

/// Mints a process-unique placeholder name for a nameless declaration.
pub fn anonymous_name() -> String {
  let n = NEXT_ANONYMOUS.fetch_add(1, Ordering::Relaxed);
  format!("{}{}", ANONYMOUS_PREFIX, n)
}

pub fn is_anonymous_name(name: &str) -> bool {
  name.starts_with(ANONYMOUS_PREFIX)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn anonymous_names_are_unique_and_recognisable() {
    let a = anonymous_name();
    let b = anonymous_name();
    assert_ne!(a, b);
    assert!(is_anonymous_name(&a));
    assert!(is_anonymous_name(&b));
    assert!(!is_anonymous_name("POINT"));
  }

  #[test]
  fn names_hash_by_identifier_and_kind() {
    use ahash::HashSet;
    use ahash::HashSetExt;
    let mut set = HashSet::new();
    set.insert(Name::new("X", NameKind::Struct));
    assert!(!set.contains(&Name::new("X", NameKind::Procedure)));
    assert!(set.contains(&Name::new("X", NameKind::Struct)));
  }
}

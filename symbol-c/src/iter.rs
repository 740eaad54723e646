use crate::arena::SymbolArena;
use crate::arena::SymbolId;
use crate::kind::SymbolCategory;
use ahash::HashSet;
use ahash::HashSetExt;
use std::collections::VecDeque;

/// One parent/child edge discovered during a graph walk. Roots appear once
/// with no parent.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Relationship {
  pub parent: Option<SymbolId>,
  pub symbol: SymbolId,
}

/// Breadth-first walk from `roots`, recording each edge once. A node visited
/// through several parents appears once per distinct parent, but its own
/// children are expanded only on first visit, so cyclic graphs terminate.
pub fn find_relationships(
  arena: &SymbolArena,
  roots: impl IntoIterator<Item = SymbolId>,
) -> Vec<Relationship> {
  let mut out = Vec::new();
  let mut expanded = HashSet::new();
  let mut queue = VecDeque::new();
  for root in roots {
    queue.push_back(Relationship {
      parent: None,
      symbol: root,
    });
  }
  while let Some(rel) = queue.pop_front() {
    out.push(rel);
    if !expanded.insert(rel.symbol) {
      continue;
    }
    for child in arena.children(rel.symbol) {
      queue.push_back(Relationship {
        parent: Some(rel.symbol),
        symbol: child,
      });
    }
  }
  out
}

/// Every node reachable from `roots`, in visit order, each once.
pub fn find_reachable(
  arena: &SymbolArena,
  roots: impl IntoIterator<Item = SymbolId>,
) -> Vec<SymbolId> {
  let mut seen = HashSet::new();
  find_relationships(arena, roots)
    .into_iter()
    .filter(|rel| seen.insert(rel.symbol))
    .map(|rel| rel.symbol)
    .collect()
}

/// Reachable nodes that are definitions (structs, unions, enums, function
/// pointers). Used to pick up anonymous definitions nested inside others.
pub fn find_reachable_defined(
  arena: &SymbolArena,
  roots: impl IntoIterator<Item = SymbolId>,
) -> Vec<SymbolId> {
  find_reachable(arena, roots)
    .into_iter()
    .filter(|&id| arena.category(id) == SymbolCategory::Defined)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kind::BuiltinKind;

  #[test]
  fn records_each_edge_once_including_duplicates_by_parent() {
    let mut arena = SymbolArena::new();
    let s = arena.new_struct("S");
    let builtin = arena.new_builtin(BuiltinKind::Int, false);
    let a = arena.add_member(s, "a", builtin);
    let b = arena.add_member(s, "b", builtin);

    let rels = find_relationships(&arena, [s]);
    assert!(rels.contains(&Relationship {
      parent: None,
      symbol: s
    }));
    // The builtin is shared; it shows up under both members.
    assert!(rels.contains(&Relationship {
      parent: Some(a),
      symbol: builtin
    }));
    assert!(rels.contains(&Relationship {
      parent: Some(b),
      symbol: builtin
    }));
    assert_eq!(rels.len(), 5);
  }

  #[test]
  fn terminates_on_cycles() {
    let mut arena = SymbolArena::new();
    let s = arena.new_struct("node");
    let named = arena.new_named("node");
    arena.set_real_type(named, s);
    let ptr = arena.new_pointer(named);
    arena.add_member(s, "next", ptr);

    let reached = find_reachable(&arena, [s]);
    assert_eq!(reached.len(), 4);
    assert!(reached.contains(&s));
    assert!(reached.contains(&ptr));
  }

  #[test]
  fn finds_nested_definitions() {
    let mut arena = SymbolArena::new();
    let outer = arena.new_struct("outer");
    let inner = arena.new_struct("inner");
    let named = arena.new_named("inner");
    arena.set_real_type(named, inner);
    arena.add_member(outer, "nested", named);

    let defined = find_reachable_defined(&arena, [outer]);
    assert_eq!(defined, vec![outer, inner]);
  }
}

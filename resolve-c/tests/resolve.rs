use resolve_c::BagError;
use resolve_c::DllResolver;
use resolve_c::NoDlls;
use resolve_c::SymbolBag;
use symbol_c::arena::SymbolArena;
use symbol_c::diag::Diagnostics;
use symbol_c::kind::BuiltinKind;
use symbol_c::kind::ConstantKind;
use symbol_c::kind::NameKind;
use symbol_c::kind::SymbolKind;
use symbol_c::lookup::MemoryStore;
use symbol_c::lookup::SymbolStorage;
use symbol_c::name::is_anonymous_name;
use symbol_c::name::Name;
use symbol_c::sym::Symbol;
use symbol_c::sym::ValuePayload;

fn windows_store() -> MemoryStore {
  let mut arena = SymbolArena::new();
  let mut store = MemoryStore::new();

  let int = arena.new_builtin(BuiltinKind::Int, true);
  let dword = arena.new_typedef("DWORD", Some(int));
  store.add_typedef(&arena, dword).unwrap();

  let inner = arena.new_struct("INNER");
  let field_ty = arena.new_builtin(BuiltinKind::Int, false);
  arena.add_member(inner, "x", field_ty);
  store.add_defined_type(&arena, inner).unwrap();

  // Typedef whose body still references INNER by name, so loading it leaves
  // work for another resolution round.
  let named = arena.new_named("INNER");
  let ptr = arena.new_pointer(named);
  let pinner = arena.new_typedef("PINNER", Some(ptr));
  store.add_typedef(&arena, pinner).unwrap();

  let colors = arena.new_enum("Colors");
  arena.add_enum_value(colors, "GREEN", "1");
  store.add_defined_type(&arena, colors).unwrap();

  store
}

#[test]
fn resolves_against_backing_store() {
  let mut bag = SymbolBag::with_backing(Box::new(windows_store()));
  let s = bag.arena_mut().new_struct("S");
  let named = bag.arena_mut().new_named("DWORD");
  bag.arena_mut().add_member(s, "value", named);
  bag.add_defined_type(s).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&NoDlls, &mut diag));
  assert!(!diag.has_errors());
  assert!(bag.find_typedef("DWORD").is_some());
  assert!(bag.is_fully_resolved(s));
}

#[test]
fn fixpoint_loads_transitive_dependencies() {
  let mut bag = SymbolBag::with_backing(Box::new(windows_store()));
  let s = bag.arena_mut().new_struct("USER");
  let named = bag.arena_mut().new_named("PINNER");
  bag.arena_mut().add_member(s, "handle", named);
  bag.add_defined_type(s).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&NoDlls, &mut diag));
  // PINNER's body referenced INNER, which had to come over in a later round.
  assert!(bag.find_defined_type("INNER").is_some());
  assert!(bag.is_fully_resolved(s));
  assert_eq!(bag.find_resolved_defined_types().len(), 2);
}

#[test]
fn self_referential_struct_resolves() {
  let mut bag = SymbolBag::new();
  let node = bag.arena_mut().new_struct("node");
  let named = bag.arena_mut().new_named("node");
  let ptr = bag.arena_mut().new_pointer(named);
  bag.arena_mut().add_member(node, "next", ptr);
  bag.add_defined_type(node).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&NoDlls, &mut diag));
  assert!(bag.is_fully_resolved(node));
  assert_eq!(bag.find_resolved_defined_types(), vec![node]);
}

#[test]
fn pointer_to_unknown_qualified_type_degrades_to_opaque() {
  let mut bag = SymbolBag::new();
  let s = bag.arena_mut().new_struct("S");
  let named = bag.arena_mut().new_named_type("struct", "missing", false);
  let ptr = bag.arena_mut().new_pointer(named);
  bag.arena_mut().add_member(s, "p", ptr);
  bag.add_defined_type(s).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&NoDlls, &mut diag));
  assert!(!diag.has_errors());
  assert_eq!(diag.warnings().len(), 1);
  assert!(diag.warnings()[0].contains("struct missing"));
  assert!(bag.is_fully_resolved(s));
  let real = bag.arena().dig_through_typedefs(named).unwrap();
  assert_eq!(bag.arena().kind(real), SymbolKind::Opaque);
}

#[test]
fn unknown_unqualified_type_is_an_error() {
  let mut bag = SymbolBag::new();
  let s = bag.arena_mut().new_struct("S");
  let named = bag.arena_mut().new_named("missing");
  bag.arena_mut().add_member(s, "m", named);
  bag.add_defined_type(s).unwrap();

  let mut diag = Diagnostics::new();
  assert!(!bag.resolve(&NoDlls, &mut diag));
  assert!(diag.has_errors());
  assert!(bag.find_resolved_defined_types().is_empty());
}

#[test]
fn qualification_mismatch_is_a_miss() {
  let mut bag = SymbolBag::new();
  let u = bag.arena_mut().new_union("MIXED");
  let ty = bag.arena_mut().new_builtin(BuiltinKind::Int, false);
  bag.arena_mut().add_member(u, "raw", ty);
  bag.add_defined_type(u).unwrap();

  let s = bag.arena_mut().new_struct("S");
  let named = bag.arena_mut().new_named_type("struct", "MIXED", false);
  bag.arena_mut().add_member(s, "m", named);
  bag.add_defined_type(s).unwrap();

  let mut diag = Diagnostics::new();
  assert!(!bag.resolve(&NoDlls, &mut diag));
  assert!(diag.has_errors());
}

#[test]
fn class_qualification_matches_struct() {
  let mut bag = SymbolBag::new();
  let obj = bag.arena_mut().new_struct("obj");
  bag.add_defined_type(obj).unwrap();

  let s = bag.arena_mut().new_struct("S");
  let named = bag.arena_mut().new_named_type("class", "obj", false);
  bag.arena_mut().add_member(s, "o", named);
  bag.add_defined_type(s).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&NoDlls, &mut diag));
  assert!(!diag.has_errors());
}

#[test]
fn constants_resolve_against_each_other() {
  let mut bag = SymbolBag::new();
  let a = bag.arena_mut().new_constant("A", "10", ConstantKind::Macro);
  let b = bag.arena_mut().new_constant("B", "A + 1", ConstantKind::Macro);
  bag.add_constant(a).unwrap();
  bag.add_constant(b).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&NoDlls, &mut diag));
  assert!(bag.is_fully_resolved(b));

  // The reference inside B now points at the constant A.
  let value_expr = bag.arena().children(b)[0];
  let leaf = bag.arena().children(value_expr)[0];
  let Symbol::Value(d) = bag.arena().get(leaf) else {
    panic!("expected value leaf");
  };
  assert_eq!(d.payload, ValuePayload::SymbolValue(Some(a)));
}

#[test]
fn ambiguous_enum_value_takes_first_registered() {
  let mut bag = SymbolBag::new();
  let colors = bag.arena_mut().new_enum("Colors");
  bag.arena_mut().add_enum_value(colors, "RED", "0");
  bag.add_defined_type(colors).unwrap();
  let flags = bag.arena_mut().new_enum("Flags");
  bag.arena_mut().add_enum_value(flags, "RED", "1");
  bag.add_defined_type(flags).unwrap();

  let c = bag.arena_mut().new_constant("PICKED", "RED", ConstantKind::Macro);
  bag.add_constant(c).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&NoDlls, &mut diag));
  let value_expr = bag.arena().children(c)[0];
  let leaf = bag.arena().children(value_expr)[0];
  let Symbol::Value(d) = bag.arena().get(leaf) else {
    panic!("expected value leaf");
  };
  assert_eq!(d.payload, ValuePayload::SymbolValue(Some(colors)));
}

#[test]
fn enum_values_load_from_backing_store() {
  let mut bag = SymbolBag::with_backing(Box::new(windows_store()));
  let c = bag.arena_mut().new_constant("USES_GREEN", "GREEN", ConstantKind::Macro);
  bag.add_constant(c).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&NoDlls, &mut diag));
  assert!(bag.find_defined_type("Colors").is_some());
}

#[test]
fn shadowed_backing_enum_leaves_value_unresolved() {
  // The backing store knows an enum Flags declaring RED, but the bag already
  // holds an unrelated struct under the same name, so the enum can never be
  // merged. Resolution must settle on an error instead of re-loading the
  // enum round after round.
  let mut store_arena = SymbolArena::new();
  let mut store = MemoryStore::new();
  let flags = store_arena.new_enum("Flags");
  store_arena.add_enum_value(flags, "RED", "1");
  store.add_defined_type(&store_arena, flags).unwrap();

  let mut bag = SymbolBag::with_backing(Box::new(store));
  let shadow = bag.arena_mut().new_struct("Flags");
  bag.add_defined_type(shadow).unwrap();
  let c = bag.arena_mut().new_constant("PICKED", "RED", ConstantKind::Macro);
  bag.add_constant(c).unwrap();

  let mut diag = Diagnostics::new();
  assert!(!bag.resolve(&NoDlls, &mut diag));
  assert!(diag.has_errors());
  assert!(diag.errors().iter().any(|e| e.contains("RED")));
  // The local struct keeps its spot in the type namespace.
  assert_eq!(bag.find_defined_type("Flags"), Some(shadow));
}

#[test]
fn cast_targets_resolve_as_types() {
  let mut bag = SymbolBag::with_backing(Box::new(windows_store()));
  let c = bag
    .arena_mut()
    .new_constant("NEG", "(DWORD)-1", ConstantKind::Macro);
  bag.add_constant(c).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&NoDlls, &mut diag));
  let value_expr = bag.arena().children(c)[0];
  let cast_leaf = bag.arena().children(value_expr)[0];
  let Symbol::Value(d) = bag.arena().get(cast_leaf) else {
    panic!("expected value leaf");
  };
  assert!(matches!(d.payload, ValuePayload::SymbolType(Some(_))));
}

#[test]
fn unparsable_macro_body_still_resolves() {
  let mut bag = SymbolBag::new();
  let c = bag
    .arena_mut()
    .new_constant("WEIRD", "} broken {", ConstantKind::Macro);
  bag.add_constant(c).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&NoDlls, &mut diag));
  assert!(bag.is_fully_resolved(c));
  assert_eq!(bag.find_resolved_constants(), vec![c]);
}

#[test]
fn duplicate_names_are_rejected_per_namespace() {
  let mut bag = SymbolBag::new();
  let a = bag.arena_mut().new_struct("X");
  let b = bag.arena_mut().new_struct("X");
  bag.add_defined_type(a).unwrap();
  assert_eq!(
    bag.add_defined_type(b),
    Err(BagError::DuplicateName(Name::new("X", NameKind::Struct)))
  );
  // Same identifier in another namespace is fine.
  let p = bag.arena_mut().new_procedure("X");
  bag.add_procedure(p).unwrap();
}

#[test]
fn nameless_definitions_get_generated_names() {
  let mut bag = SymbolBag::new();
  let a = bag.arena_mut().new_struct("");
  let b = bag.arena_mut().new_union("");
  bag.add_defined_type(a).unwrap();
  bag.add_defined_type(b).unwrap();
  let name_a = bag.arena().name(a).unwrap().to_string();
  let name_b = bag.arena().name(b).unwrap().to_string();
  assert!(is_anonymous_name(&name_a));
  assert!(is_anonymous_name(&name_b));
  assert_ne!(name_a, name_b);
}

struct Kernel32;

impl DllResolver for Kernel32 {
  fn find_dll(&self, proc_name: &str) -> Option<String> {
    if proc_name.starts_with("CreateFile") {
      Some("kernel32.dll".to_string())
    } else {
      None
    }
  }
}

#[test]
fn dll_names_come_from_the_resolver() {
  let mut bag = SymbolBag::new();
  let p = bag.arena_mut().new_procedure("CreateFileW");
  let q = bag.arena_mut().new_procedure("Unknowable");
  bag.add_procedure(p).unwrap();
  bag.add_procedure(q).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&Kernel32, &mut diag));
  let Symbol::Procedure(d) = bag.arena().get(p) else {
    panic!("expected procedure");
  };
  assert_eq!(d.dll_name.as_deref(), Some("kernel32.dll"));
  let Symbol::Procedure(d) = bag.arena().get(q) else {
    panic!("expected procedure");
  };
  assert_eq!(d.dll_name, None);
}

#[test]
fn save_to_storage_round_trips_through_a_new_bag() {
  let mut bag = SymbolBag::new();
  let point = bag.arena_mut().new_struct("POINT");
  let x_ty = bag.arena_mut().new_builtin(BuiltinKind::Int, false);
  bag.arena_mut().add_member(point, "x", x_ty);
  bag.arena_mut().add_member(point, "y", x_ty);
  bag.add_defined_type(point).unwrap();
  let max = bag.arena_mut().new_constant("MAX_PATH", "260", ConstantKind::Macro);
  bag.add_constant(max).unwrap();

  let mut diag = Diagnostics::new();
  assert!(bag.resolve(&NoDlls, &mut diag));
  let mut store = MemoryStore::new();
  bag.save_to_storage(&mut store).unwrap();
  assert_eq!(store.count(), 2);

  let mut second = SymbolBag::with_backing(Box::new(store));
  let s = second.arena_mut().new_struct("WRAPPER");
  let named = second.arena_mut().new_named("POINT");
  second.arena_mut().add_member(s, "origin", named);
  second.add_defined_type(s).unwrap();
  let mut diag = Diagnostics::new();
  assert!(second.resolve(&NoDlls, &mut diag));
  assert!(second.is_fully_resolved(s));
}

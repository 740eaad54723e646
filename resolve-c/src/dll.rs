/// Answers which DLL exports a procedure. Implementations typically probe a
/// fixed list of system libraries; resolution itself never needs one, so the
/// default is to know nothing.
pub trait DllResolver {
  fn find_dll(&self, proc_name: &str) -> Option<String>;
}

/// Resolver that never finds a module.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoDlls;

impl DllResolver for NoDlls {
  fn find_dll(&self, _proc_name: &str) -> Option<String> {
    None
  }
}

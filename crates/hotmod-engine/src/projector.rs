//! Property projection onto handles

use hotmod_kernel::Module;
use std::sync::Arc;
use tracing::trace;

use crate::handle::ModuleHandle;

/// Copy the record's members, and its shared behaviour when it has one,
/// onto the handle surface.
///
/// Members missing from `record` are left on the surface as they were.
pub fn project(handle: &ModuleHandle, record: &Arc<dyn Module>) {
    let members = record.members();
    let shared = record.shared_behavior();

    let mut surface = handle.surface.write();
    for (name, value) in members {
        trace!("Projecting {:?}.{}", handle.path(), name);
        surface.members.insert(name, value);
    }
    if shared.is_some() {
        surface.shared = shared;
    }
    surface.version = record.version();
}

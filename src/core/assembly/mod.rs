// ─── Instance Assembly ───
// Request types, the fixed assembly policy, the background assembler and the
// delivery-side archive lookup.

mod assembler;
mod delivery;
mod policy;
mod request;


pub use assembler::InstanceAssembler;
pub use delivery::{archive_path, find_archive_name};
pub use policy::{render_instance_cfg, Adjustment, AssemblyPolicy, LocalOverride, RedundancyRule};
pub use request::{AssemblyHandle, AssemblyRequest, AssemblyStatus};

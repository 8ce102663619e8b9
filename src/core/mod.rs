// ─── Instancesmith Core ───
// Backend that assembles ready-to-import launcher instances.
//
// Architecture:
//   core/
//     registry/   — Mod descriptors + catalog loader
//     resolver/   — Transitive dependency closure
//     cache/      — Per-source artifact cache with freshness window
//     downloader/ — Streaming downloads to `.part` files
//     fetcher/    — GitHub releases / Modrinth artifact lookup
//     archive/    — Zip unpack, inject, repack
//     assembly/   — Request model, policy tables, background assembler
//     state/      — Settings + wired application state

pub mod archive;
pub mod assembly;
pub mod cache;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod registry;
pub mod resolver;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

// ─── Instance Assembler ───
// Turns a request into a downloadable instance archive on a background task:
// resolve, fetch, unpack the template, inject, repack, clean up.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::archive;
use crate::core::error::{AssemblerError, AssemblerResult};
use crate::core::fetcher::ArtifactFetcher;
use crate::core::registry::{ModDescriptor, ModRegistry};
use crate::core::resolver::{DependencyResolver, ResolvedModSet};
use crate::core::state::Settings;

use super::delivery::archive_path;
use super::policy::{render_instance_cfg, AssemblyPolicy};
use super::request::{AssemblyHandle, AssemblyRequest, AssemblyStatus};

const INSTANCE_ID_LEN: usize = 6;
const MAX_ID_ATTEMPTS: usize = 32;
/// Holds the template copy, staged mods and unpacked tree. Display names
/// only ever name `<name>.zip`, so they cannot land on it.
const WORK_DIR_NAME: &str = ".work";
const TEMPLATE_FILE_NAME: &str = "template.zip";
const STAGED_MODS_DIR_NAME: &str = "mods";
const TREE_DIR_NAME: &str = "tree";

pub struct InstanceAssembler {
    settings: Arc<Settings>,
    registry: Arc<ModRegistry>,
    fetcher: Arc<ArtifactFetcher>,
    policy: Arc<AssemblyPolicy>,
}

impl InstanceAssembler {
    pub fn new(
        settings: Arc<Settings>,
        registry: Arc<ModRegistry>,
        fetcher: Arc<ArtifactFetcher>,
    ) -> Self {
        Self {
            settings,
            registry,
            fetcher,
            policy: Arc::new(AssemblyPolicy::default()),
        }
    }

    pub fn with_policy(mut self, policy: AssemblyPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Reserve a fresh instance directory and start assembling into it.
    ///
    /// Returns as soon as the directory exists; progress is reported through
    /// the handle.
    pub async fn create(&self, request: AssemblyRequest) -> AssemblerResult<AssemblyHandle> {
        let instances_dir = self.settings.instances_dir();
        tokio::fs::create_dir_all(&instances_dir)
            .await
            .map_err(|source| AssemblerError::Io {
                path: instances_dir.clone(),
                source,
            })?;

        let (id, dir) = reserve_instance_dir(&instances_dir).await?;
        let (tx, rx) = watch::channel(AssemblyStatus::Pending);

        info!(
            "Assembling instance {} ({} mods requested)",
            id,
            request.mod_ids.len()
        );

        let job = AssemblyJob {
            id: id.clone(),
            dir: dir.clone(),
            request,
            settings: Arc::clone(&self.settings),
            registry: Arc::clone(&self.registry),
            fetcher: Arc::clone(&self.fetcher),
            policy: Arc::clone(&self.policy),
            status: tx,
        };
        tokio::spawn(async move { job.run_to_completion().await });

        Ok(AssemblyHandle::new(id, dir, rx))
    }
}

/// Pick a random id whose directory does not exist yet and create it.
async fn reserve_instance_dir(instances_dir: &Path) -> AssemblerResult<(String, PathBuf)> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = new_instance_id();
        let dir = instances_dir.join(&id);
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => return Ok((id, dir)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("Instance id {} already taken, drawing another", id);
            }
            Err(source) => return Err(AssemblerError::Io { path: dir, source }),
        }
    }
    Err(AssemblerError::Other(format!(
        "no free instance id after {} attempts",
        MAX_ID_ATTEMPTS
    )))
}

fn new_instance_id() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(INSTANCE_ID_LEN)
        .collect()
}

/// Jars to drop into the mods folder for one resolved mod.
#[derive(Debug)]
struct ModPayload {
    mod_id: String,
    files: Vec<PathBuf>,
}

struct Fetched {
    template: PathBuf,
    payloads: Vec<ModPayload>,
    skipped: Vec<String>,
}

struct AssemblyJob {
    id: String,
    dir: PathBuf,
    request: AssemblyRequest,
    settings: Arc<Settings>,
    registry: Arc<ModRegistry>,
    fetcher: Arc<ArtifactFetcher>,
    policy: Arc<AssemblyPolicy>,
    status: watch::Sender<AssemblyStatus>,
}

impl AssemblyJob {
    async fn run_to_completion(self) {
        match self.run().await {
            Ok((archive, skipped_mods)) => {
                info!("Instance {} ready at {:?}", self.id, archive);
                self.advance(AssemblyStatus::Done {
                    archive,
                    skipped_mods,
                });
            }
            Err(e) => {
                error!("Assembly of instance {} failed: {}", self.id, e);
                self.advance(AssemblyStatus::Failed {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn advance(&self, status: AssemblyStatus) {
        debug!("Instance {}: {:?}", self.id, status);
        self.status.send_replace(status);
    }

    async fn run(&self) -> AssemblerResult<(PathBuf, Vec<String>)> {
        let display_name = self
            .request
            .display_name(&self.settings.default_instance_name);
        let wanted = self.policy.augment(&self.request.mod_ids);
        let resolved = DependencyResolver::new(&self.registry).resolve(&wanted);
        debug!("Instance {} resolved to {:?}", self.id, resolved.ids());

        // Everything transient lives under one directory that no archive
        // name can collide with.
        let work = self.dir.join(WORK_DIR_NAME);

        self.advance(AssemblyStatus::Fetching);
        let fetched = self.fetch_all(&resolved, &work).await?;

        self.advance(AssemblyStatus::Unpacking);
        let tree = work.join(TREE_DIR_NAME);
        {
            let template = fetched.template.clone();
            let tree = tree.clone();
            blocking(move || archive::unpack(&template, &tree)).await?;
        }

        self.advance(AssemblyStatus::Injecting);
        let injection = Injection {
            work_dir: tree.clone(),
            icon_file_name: format!("{}.png", self.request.icon_key()),
            icons_dir: self.settings.icons_dir.clone(),
            instance_cfg: render_instance_cfg(&display_name, &self.request.icon_key()),
            adjustments: self
                .policy
                .adjustments
                .iter()
                .map(|a| (self.settings.adjustments_dir.join(&a.source), a.dest.clone()))
                .collect(),
            mods_dir: self.policy.mods_dir.clone(),
            payloads: fetched.payloads,
        };
        blocking(move || injection.apply()).await?;

        self.advance(AssemblyStatus::Repacking);
        let output = archive_path(&self.settings.instances_dir(), &self.id, &display_name);
        {
            let tree = tree.clone();
            let output = output.clone();
            blocking(move || archive::pack(&tree, &output)).await?;
        }

        self.advance(AssemblyStatus::CleaningUp);
        tokio::fs::remove_dir_all(&work)
            .await
            .map_err(|source| AssemblerError::Io {
                path: work.clone(),
                source,
            })?;

        Ok((output, fetched.skipped))
    }

    /// Fetch the template and every resolved mod into `work`. Only the
    /// template is required; mods that fail are left out. A template
    /// failure abandons the mod fetches still in flight.
    async fn fetch_all(&self, resolved: &ResolvedModSet, work: &Path) -> AssemblerResult<Fetched> {
        let template_path = work.join(TEMPLATE_FILE_NAME);
        let template = self
            .fetcher
            .stage_base_template(&self.settings.base_template, &template_path);

        let staging = work.join(STAGED_MODS_DIR_NAME);
        let descriptors: Vec<ModDescriptor> = resolved.iter().cloned().collect();
        let mods = async {
            let results = stream::iter(descriptors)
                .map(|descriptor| {
                    let staging = staging.join(&descriptor.id);
                    async move {
                        let result = self.fetch_payload(&descriptor, &staging).await;
                        (descriptor.id, result)
                    }
                })
                .buffered(self.settings.fetch_concurrency.max(1))
                .collect::<Vec<_>>()
                .await;
            Ok::<_, AssemblerError>(results)
        };

        let (template, results) = tokio::try_join!(template, mods)?;

        let mut payloads = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (mod_id, result) in results {
            match result {
                Ok(payload) => payloads.push(payload),
                Err(e) if e.is_fatal_for_assembly() => return Err(e),
                Err(e) => {
                    warn!("Leaving {} out of instance {}: {}", mod_id, self.id, e);
                    skipped.push(mod_id);
                }
            }
        }

        Ok(Fetched {
            template,
            payloads,
            skipped,
        })
    }

    async fn fetch_payload(
        &self,
        descriptor: &ModDescriptor,
        staging: &Path,
    ) -> AssemblerResult<ModPayload> {
        if let Some(file) = self.policy.local_override(&descriptor.id) {
            debug!("Using local override {:?} for {}", file, descriptor.id);
            return Ok(ModPayload {
                mod_id: descriptor.id.clone(),
                files: vec![self.settings.adjustments_dir.join(file)],
            });
        }

        let files = self
            .fetcher
            .stage_mod_artifacts(descriptor, staging)
            .await?;

        Ok(ModPayload {
            mod_id: descriptor.id.clone(),
            files,
        })
    }
}

/// Everything the injecting step writes into the unpacked tree.
struct Injection {
    work_dir: PathBuf,
    icons_dir: PathBuf,
    icon_file_name: String,
    instance_cfg: String,
    /// (absolute source, destination relative to the tree)
    adjustments: Vec<(PathBuf, PathBuf)>,
    mods_dir: PathBuf,
    payloads: Vec<ModPayload>,
}

impl Injection {
    fn apply(self) -> AssemblerResult<()> {
        let icon_source = self.icons_dir.join(&self.icon_file_name);
        archive::copy_into(&self.work_dir, &self.icon_file_name, &icon_source)?;
        archive::write_file(&self.work_dir, "instance.cfg", self.instance_cfg.as_bytes())?;

        let mods_dir = self.work_dir.join(&self.mods_dir);
        std::fs::create_dir_all(&mods_dir).map_err(|source| AssemblerError::Io {
            path: mods_dir.clone(),
            source,
        })?;

        for (source, dest) in &self.adjustments {
            archive::copy_into(&self.work_dir, dest, source)?;
        }

        for payload in &self.payloads {
            if payload.files.is_empty() {
                warn!("No artifact files cached for {}", payload.mod_id);
            }
            for file in &payload.files {
                let name = file.file_name().ok_or_else(|| {
                    AssemblerError::Other(format!("artifact path without file name: {:?}", file))
                })?;
                archive::copy_into(&mods_dir, name, file)?;
            }
        }

        Ok(())
    }
}

async fn blocking<T, F>(task: F) -> AssemblerResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AssemblerResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task).await?
}

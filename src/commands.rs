use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{info, warn};

use crate::core::assembly::{AssemblyRequest, AssemblyStatus};
use crate::core::error::{AssemblerError, AssemblerResult};
use crate::core::state::{AppState, Settings};

/// Assemble a ready-to-import Prism instance archive.
#[derive(Debug, Parser)]
#[command(name = "instancesmith", version, about)]
pub struct Cli {
    /// Request file: {"mods": [...], "icon": <n>, "instanceName": "..."}
    #[arg(required_unless_present = "list")]
    pub request: Option<PathBuf>,

    /// Settings file (JSON); missing fields use defaults
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the selectable mods and exit
    #[arg(long)]
    pub list: bool,
}

pub async fn execute(cli: Cli) -> AssemblerResult<()> {
    let settings = Settings::load(cli.config.as_deref());
    let state = AppState::initialize(settings).await?;

    if cli.list {
        list_mods(&state);
        return Ok(());
    }

    let path = cli
        .request
        .ok_or_else(|| AssemblerError::Other("no request file given".into()))?;
    let request = read_request(&path).await?;
    assemble(&state, request).await
}

fn list_mods(state: &AppState) {
    for descriptor in state.listing() {
        println!(
            "{:<24} {}",
            descriptor.id,
            descriptor.display_title.as_deref().unwrap_or("")
        );
    }
}

async fn read_request(path: &Path) -> AssemblerResult<AssemblyRequest> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AssemblerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(serde_json::from_str(&raw)?)
}

async fn assemble(state: &AppState, request: AssemblyRequest) -> AssemblerResult<()> {
    let handle = state.start_assembly(request).await?;
    println!("{}", handle.id);

    let mut progress = handle.subscribe();
    loop {
        let status = progress.borrow_and_update().clone();
        if status.is_terminal() {
            return report(&handle.id, status);
        }
        info!("Instance {}: {:?}", handle.id, status);

        if progress.changed().await.is_err() {
            return report(&handle.id, handle.wait().await);
        }
    }
}

fn report(id: &str, status: AssemblyStatus) -> AssemblerResult<()> {
    match status {
        AssemblyStatus::Done {
            archive,
            skipped_mods,
        } => {
            if !skipped_mods.is_empty() {
                warn!("Instance {} is missing: {}", id, skipped_mods.join(", "));
            }
            println!("{}", archive.display());
            Ok(())
        }
        AssemblyStatus::Failed { reason } => Err(AssemblerError::Other(reason)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_required_unless_listing() {
        assert!(Cli::try_parse_from(["instancesmith"]).is_err());

        let cli = Cli::try_parse_from(["instancesmith", "--list"]).unwrap();
        assert!(cli.list);
        assert!(cli.request.is_none());

        let cli =
            Cli::try_parse_from(["instancesmith", "req.json", "--config", "smith.json"]).unwrap();
        assert_eq!(cli.request, Some(PathBuf::from("req.json")));
        assert_eq!(cli.config, Some(PathBuf::from("smith.json")));
    }

    #[tokio::test]
    async fn reads_request_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("req.json");
        std::fs::write(&path, r#"{"mods":["examplemod"],"icon":3,"instanceName":"Test"}"#).unwrap();

        let request = read_request(&path).await.unwrap();
        assert_eq!(request.icon_id, 3);
        assert!(read_request(&tmp.path().join("missing.json")).await.is_err());
    }

    #[test]
    fn failed_status_becomes_error() {
        let err = report("abc123", AssemblyStatus::Failed { reason: "boom".into() }).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}

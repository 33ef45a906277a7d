//! Starting games through their launch identifier.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::info;

use crate::models::{GameRecord, LaunchTarget};

/// Start `record`. Sample records cannot be launched.
pub async fn launch_record(record: &GameRecord) -> Result<()> {
    if record.is_sample {
        bail!("{} is a sample entry and cannot be launched", record.title);
    }
    info!(id = %record.id, title = %record.title, launch_target = %record.launch_target, "Launching game");
    launch(&record.launch_target).await
}

/// Open a launch identifier.
///
/// URIs go through the platform opener, which returns once the handler has
/// been invoked. Executables are spawned from their own directory and left running.
pub async fn launch(target: &LaunchTarget) -> Result<()> {
    match target {
        LaunchTarget::Uri(uri) => {
            let (program, args) = opener(uri);
            let status = Command::new(program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .with_context(|| format!("failed to execute {program}"))?;
            if !status.success() {
                bail!("{program} exited with {status} while opening {uri}");
            }
        }
        LaunchTarget::Executable(path) => {
            if !path.is_file() {
                bail!("executable {} does not exist", path.display());
            }
            let mut command = Command::new(path);
            if let Some(dir) = path.parent() {
                command.current_dir(dir);
            }
            command
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .with_context(|| format!("failed to start {}", path.display()))?;
        }
    }
    Ok(())
}

/// Program and arguments that hand `uri` to the desktop's protocol handler.
fn opener(uri: &str) -> (&'static str, Vec<String>) {
    if cfg!(windows) {
        // `start` treats its first quoted argument as a window title.
        ("cmd", vec!["/C".into(), "start".into(), String::new(), uri.into()])
    } else if cfg!(target_os = "macos") {
        ("open", vec![uri.into()])
    } else {
        ("xdg-open", vec![uri.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::sample_records;
    use std::path::PathBuf;

    #[test]
    fn opener_passes_the_uri_last() {
        let (program, args) = opener("steam://run/620");
        assert!(!program.is_empty());
        assert_eq!(args.last().map(String::as_str), Some("steam://run/620"));
    }

    #[tokio::test]
    async fn samples_and_missing_executables_are_refused() {
        let sample = &sample_records()[0];
        assert!(launch_record(sample).await.is_err());

        let missing = LaunchTarget::Executable(PathBuf::from("/definitely/not/here/game.exe"));
        assert!(launch(&missing).await.is_err());
    }
}

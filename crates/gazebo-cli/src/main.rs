//! gz-storage: command line access to Gazebo resource storage.
//!
//! - `gz-storage --storage <uri> upload-dir <resource> <dir>`
//! - `gz-storage --storage <uri> upload-zip <resource> <zip>`
//! - `gz-storage --storage <uri> download <resource>`
//! - `gz-storage --storage <uri> get-file <resource> <path> [--out <file>]`
//!
//! `<resource>` is `--owner --kind --uuid --version`.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use gazebo_core::{Resource, StorageConfig};
use gazebo_storage::open_storage;

#[derive(Debug, Parser)]
#[command(name = "gz-storage", about = "Upload and fetch Gazebo resources")]
struct Cli {
    /// Storage URI: `local://<dir>`, `s3://<bucket>?region=..`, or `gs://<bucket>`.
    #[arg(long)]
    storage: String,

    /// Lifetime of pre-signed download URLs, in minutes.
    #[arg(long, default_value_t = 60)]
    link_ttl_minutes: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ResourceArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    kind: String,
    #[arg(long)]
    uuid: String,
    #[arg(long)]
    version: u64,
}

impl Cli {
    fn link_ttl(&self) -> Duration {
        Duration::from_secs(self.link_ttl_minutes.saturating_mul(60))
    }
}

impl From<ResourceArgs> for Resource {
    fn from(args: ResourceArgs) -> Self {
        Resource::new(args.owner, args.kind, args.uuid, args.version)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload every file under a directory.
    UploadDir {
        #[command(flatten)]
        resource: ResourceArgs,
        dir: PathBuf,
    },
    /// Upload a zip file as the resource's bundle.
    UploadZip {
        #[command(flatten)]
        resource: ResourceArgs,
        zip: PathBuf,
    },
    /// Print a link to the resource's bundle.
    Download {
        #[command(flatten)]
        resource: ResourceArgs,
    },
    /// Fetch one file, to stdout or `--out`.
    GetFile {
        #[command(flatten)]
        resource: ResourceArgs,
        path: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = StorageConfig::new(cli.storage.clone()).with_link_ttl(cli.link_ttl());
    let storage = open_storage(&config).await?;

    match cli.command {
        Command::UploadDir { resource, dir } => {
            storage.upload_dir(&resource.into(), &dir).await?;
        }
        Command::UploadZip { resource, zip } => {
            storage.upload_zip(&resource.into(), &zip).await?;
        }
        Command::Download { resource } => {
            let link = storage.download(&resource.into()).await?;
            println!("{link}");
        }
        Command::GetFile {
            resource,
            path,
            out,
        } => {
            let data = storage.get_file(&resource.into(), &path).await?;
            match out {
                Some(out) => tokio::fs::write(out, &data).await?,
                None => std::io::stdout().write_all(&data)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_get_file() {
        let cli = Cli::try_parse_from([
            "gz-storage",
            "--storage",
            "local:///tmp/fuel",
            "get-file",
            "--owner",
            "OpenRobotics",
            "--kind",
            "models",
            "--uuid",
            "e6af5323-db4d-4db3-a402-a8992d6c8d99",
            "--version",
            "1",
            "meshes/turtle.dae",
        ])
        .unwrap();
        assert_eq!(cli.link_ttl(), Duration::from_secs(3600));
        let Command::GetFile { resource, path, out } = cli.command else {
            panic!("expected get-file");
        };
        assert_eq!(path, "meshes/turtle.dae");
        assert!(out.is_none());
        let resource = Resource::from(resource);
        assert_eq!(resource.validate(), Ok(()));
    }

    #[test]
    fn test_huge_link_ttl_saturates() {
        let minutes = u64::MAX.to_string();
        let cli = Cli::try_parse_from([
            "gz-storage",
            "--storage",
            "local:///tmp/fuel",
            "--link-ttl-minutes",
            minutes.as_str(),
            "download",
            "--owner",
            "OpenRobotics",
            "--kind",
            "models",
            "--uuid",
            "e6af5323-db4d-4db3-a402-a8992d6c8d99",
            "--version",
            "1",
        ])
        .unwrap();
        assert_eq!(cli.link_ttl(), Duration::from_secs(u64::MAX));
    }
}

//! Command line definitions and dispatch.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use unrg_client::config::mask_token;
use unrg_client::docker;
use unrg_client::{ClientConfig, CredentialFile, ProgressObserver, SilentProgress, TerminalProgress, UnrgClient};

#[derive(Parser, Debug)]
#[command(
    name = "unrg",
    version,
    about = "Unregistry client - A private file/image storage system"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Disable progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Credential file (default: $UNRG_CONFIG or ~/.unrg/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
    /// File operations
    File {
        #[command(subcommand)]
        cmd: FileCmd,
    },
    /// Docker image operations
    Img {
        #[command(subcommand)]
        cmd: ImgCmd,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
    /// Set authentication token
    SetToken { token: String },
    /// Set server base URL
    SetUrl { url: String },
    /// Show the current configuration
    Show,
}

#[derive(Subcommand, Debug)]
pub enum FileCmd {
    /// Upload a file
    Push { path: PathBuf },
    /// Download a file
    Pull {
        filename: String,
        /// Destination path (default: the file name)
        dest: Option<PathBuf>,
    },
    /// List all files
    List,
    /// Delete a file
    Delete { filename: String },
}

#[derive(Subcommand, Debug)]
pub enum ImgCmd {
    /// Push a Docker image
    Push { image: String },
    /// Pull a Docker image
    Pull { image: String },
    /// List all images
    List,
    /// Delete an image
    Delete { name: String },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => CredentialFile::default_path()?,
    };

    match cli.command {
        Command::Config { cmd } => run_config(cmd, &config_path),
        Command::File { cmd } => {
            let client = connect(&config_path)?;
            run_file(cmd, &client, cli.quiet).await
        }
        Command::Img { cmd } => {
            let client = connect(&config_path)?;
            run_img(cmd, &client, cli.quiet).await
        }
    }
}

fn connect(config_path: &Path) -> anyhow::Result<UnrgClient> {
    let credentials = CredentialFile::load(config_path).context("load config")?;
    let config = ClientConfig::from_credentials(&credentials)?;
    Ok(UnrgClient::new(config)?)
}

fn progress(quiet: bool, label: String) -> Box<dyn ProgressObserver> {
    if quiet {
        Box::new(SilentProgress)
    } else {
        Box::new(TerminalProgress::new(label))
    }
}

fn run_config(cmd: ConfigCmd, path: &Path) -> anyhow::Result<()> {
    let mut credentials = CredentialFile::load(path).context("Error loading config")?;

    match cmd {
        ConfigCmd::SetToken { token } => {
            credentials.token = token;
            credentials.save(path).context("Error saving config")?;
            println!("Token saved successfully");
        }
        ConfigCmd::SetUrl { url } => {
            credentials.base_url = url;
            credentials.save(path).context("Error saving config")?;
            println!("Base URL set to: {}", credentials.base_url);
        }
        ConfigCmd::Show => {
            println!("Config file: {}", path.display());
            println!("Base URL:    {}", credentials.base_url);
            println!("Token:       {}", mask_token(&credentials.token));
        }
    }
    Ok(())
}

async fn run_file(cmd: FileCmd, client: &UnrgClient, quiet: bool) -> anyhow::Result<()> {
    match cmd {
        FileCmd::Push { path } => {
            let name = display_name(&path);
            let response = client
                .upload_file(&path, progress(quiet, format!("Uploading {}", name)))
                .await
                .context("Upload failed")?;
            println!("File {} uploaded successfully", response.filename);
        }
        FileCmd::Pull { filename, dest } => {
            let dest = dest.unwrap_or_else(|| PathBuf::from(&filename));
            client
                .download_file(&filename, &dest, progress(quiet, format!("Downloading {}", filename)))
                .await
                .context("Download failed")?;
            println!("File downloaded to: {}", dest.display());
        }
        FileCmd::List => {
            let files = client.list_files().await.context("List failed")?;
            print_listing("Files", "No files found", &files);
        }
        FileCmd::Delete { filename } => {
            client.delete_file(&filename).await.context("Delete failed")?;
            println!("File {} deleted successfully", filename);
        }
    }
    Ok(())
}

async fn run_img(cmd: ImgCmd, client: &UnrgClient, quiet: bool) -> anyhow::Result<()> {
    match cmd {
        ImgCmd::Push { image } => {
            let workdir = tempfile::tempdir().context("Failed to create temp dir")?;
            let archive = workdir.path().join(docker::archive_name(&image));

            println!("Preparing Docker image...");
            docker::save_image(&image, &archive)
                .await
                .context("Docker save failed")?;

            client
                .upload_image(&archive, progress(quiet, format!("Uploading {}", image)))
                .await
                .context("Upload failed")?;
            println!("Image {} pushed successfully", image);
        }
        ImgCmd::Pull { image } => {
            let workdir = tempfile::tempdir().context("Failed to create temp dir")?;
            let archive = workdir.path().join(docker::archive_name(&image));

            client
                .download_image(
                    &docker::stored_name(&image),
                    &archive,
                    progress(quiet, format!("Downloading {}", image)),
                )
                .await
                .context("Download failed")?;

            println!("Loading Docker image...");
            let loaded = docker::load_image(&archive)
                .await
                .context("Docker load failed")?;
            if !loaded.is_empty() {
                println!("{}", loaded);
            }
            println!("Image {} pulled successfully", image);
        }
        ImgCmd::List => {
            let images = client.list_images().await.context("List failed")?;
            print_listing("Images", "No images found", &images);
        }
        ImgCmd::Delete { name } => {
            client
                .delete_image(&docker::stored_name(&name))
                .await
                .context("Delete failed")?;
            println!("Image {} deleted successfully", name);
        }
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_listing(title: &str, empty: &str, names: &[String]) {
    if names.is_empty() {
        println!("{}", empty);
        return;
    }
    println!("{}:", title);
    for name in names {
        println!("  {}", name);
    }
}

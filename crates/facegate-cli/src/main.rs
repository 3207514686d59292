use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate_core::{Alert, HashedVerifier};
use std::path::PathBuf;

mod preview;

#[derive(Parser)]
#[command(name = "facegate", about = "Photo + password login against the facegate daemon")]
struct Cli {
    /// Talk to the daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a face photo with credentials
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
        /// Photo to check; omitting it is reported by the daemon as an error
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// Write the photo with labeled face boxes to this path
        #[arg(long, requires = "image")]
        preview: Option<PathBuf>,
        /// TrueType font for preview labels (defaults to a system font)
        #[arg(long, requires = "preview")]
        font: Option<PathBuf>,
    },
    /// Show daemon status
    Status,
    /// Print an argon2 hash for a roster `password` field
    HashPassword {
        #[arg(short, long)]
        password: String,
    },
}

#[zbus::proxy(
    interface = "org.facegate.Gate1",
    default_service = "org.facegate.Gate1",
    default_path = "/org/facegate/Gate1"
)]
trait Gate {
    async fn login(&self, username: &str, password: &str, image: &[u8]) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Login {
            username,
            password,
            image,
            preview,
            font,
        } => {
            let photo = match &image {
                Some(path) => tokio::fs::read(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?,
                None => Vec::new(),
            };
            let proxy = connect(cli.system).await?;
            let raw = proxy.login(&username, &password, &photo).await?;
            let alert: Alert = serde_json::from_str(&raw).context("daemon returned a malformed alert")?;
            tracing::debug!(kind = ?alert.kind, faces = alert.faces.len(), "alert received");

            print!("{}", render_alert(&alert));
            if let (Some(out), Some(display)) = (preview, &alert.display) {
                let font = preview::load_font(font.as_deref())?;
                preview::write_preview(&photo, display, &alert.faces, font.as_ref(), &out)?;
                println!("Preview written to {}", out.display());
            }
        }
        Commands::Status => {
            let proxy = connect(cli.system).await?;
            let raw = proxy.status().await?;
            let status: serde_json::Value = serde_json::from_str(&raw)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::HashPassword { password } => {
            let stored = HashedVerifier::hash_password(&password)
                .map_err(|e| anyhow::anyhow!("hashing password: {e}"))?;
            println!("{stored}");
        }
    }

    Ok(())
}

async fn connect(system: bool) -> Result<GateProxy<'static>> {
    let conn = if system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    }
    .context("connecting to D-Bus")?;
    Ok(GateProxy::new(&conn).await?)
}

/// Alert headline followed by one line per labeled face.
fn render_alert(alert: &Alert) -> String {
    let mut out = format!("{alert}\n");
    for face in &alert.faces {
        out.push_str(&format!("  - {} (distance {:.3})\n", face.label, face.distance));
    }
    out
}

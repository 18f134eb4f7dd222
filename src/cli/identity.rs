//! Identity selection for gameplay commands.
//!
//! Signed-in players live in the database; guests carry their whole record
//! in a session file the commands read and write back, mirroring the token
//! a browser client would hold.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use sqlx::SqlitePool;
use tokio::fs;

use crate::adapters::session::GuestProgressStore;
use crate::adapters::sqlite::{DurableProgressStore, SqliteVoteRepository};
use crate::cli::id_resolver::resolve_player_id;
use crate::domain::models::GuestSession;
use crate::domain::ports::ProgressStore;

#[derive(Args, Debug)]
pub struct IdentityArgs {
    /// Signed-in player id (any unique prefix)
    #[arg(long)]
    pub player: Option<String>,

    /// Guest session file, created on first use
    #[arg(long, default_value = ".veer/session.json")]
    pub session: PathBuf,
}

/// An opened identity backing store.
pub enum Identity {
    Durable(DurableProgressStore),
    Guest {
        store: GuestProgressStore,
        path: PathBuf,
    },
}

impl Identity {
    /// Open the durable store behind `--player`, otherwise load (or start)
    /// the guest session at `--session`.
    pub async fn open(args: &IdentityArgs, pool: &SqlitePool) -> Result<Self> {
        if let Some(prefix) = &args.player {
            let id = resolve_player_id(pool, prefix).await?;
            let store = DurableProgressStore::open(pool.clone(), id).await?;
            return Ok(Self::Durable(store));
        }

        let tally = Arc::new(SqliteVoteRepository::new(pool.clone()));
        let store = if args.session.exists() {
            let content = fs::read_to_string(&args.session)
                .await
                .with_context(|| format!("Failed to read session file {}", args.session.display()))?;
            let session: GuestSession = serde_json::from_str(&content)
                .with_context(|| format!("Malformed session file {}", args.session.display()))?;
            GuestProgressStore::resume(session, tally)
        } else {
            GuestProgressStore::new(tally)
        };

        Ok(Self::Guest {
            store,
            path: args.session.clone(),
        })
    }

    pub fn store(&self) -> &dyn ProgressStore {
        match self {
            Self::Durable(store) => store,
            Self::Guest { store, .. } => store,
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Durable(_))
    }

    /// Write guest state back to its session file. Durable identities
    /// persist through the database as they go.
    pub async fn persist(&self) -> Result<()> {
        if let Self::Guest { store, path } = self {
            let session = store.snapshot().await;
            let content = serde_json::to_string_pretty(&session)?;
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
            fs::write(path, content)
                .await
                .with_context(|| format!("Failed to write session file {}", path.display()))?;
        }
        Ok(())
    }
}

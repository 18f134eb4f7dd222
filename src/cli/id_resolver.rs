//! Short ID prefix resolution for CLI commands.
//!
//! Allows users to specify any unique prefix of a UUID instead of the full 32-char ID,
//! similar to git short hashes.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Resolve a player ID prefix to a full UUID.
pub async fn resolve_player_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    resolve_prefix(pool, prefix, "player", PLAYER_QUERY).await
}

/// Resolve a poll ID prefix to a full UUID.
pub async fn resolve_poll_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    resolve_prefix(pool, prefix, "poll", POLL_QUERY).await
}

const PLAYER_QUERY: &str = "SELECT id FROM players WHERE id LIKE ?";
const POLL_QUERY: &str = "SELECT id FROM polls WHERE id LIKE ?";

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        bail!("ID prefix must not be empty");
    }
    if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        bail!(
            "Invalid ID prefix '{}': must contain only hex characters and dashes",
            prefix
        );
    }
    Ok(())
}

async fn resolve_prefix(
    pool: &SqlitePool,
    prefix: &str,
    entity: &str,
    query: &str,
) -> Result<Uuid> {
    // Fast path: if it parses as a full UUID, return directly
    if let Ok(uuid) = Uuid::parse_str(prefix) {
        return Ok(uuid);
    }

    validate_prefix(prefix)?;

    let pattern = format!("{}%", prefix);
    let rows: Vec<(String,)> = sqlx::query_as(query).bind(&pattern).fetch_all(pool).await?;

    match rows.len() {
        0 => bail!("No {} found matching '{}'", entity, prefix),
        1 => Ok(Uuid::parse_str(&rows[0].0)?),
        n => {
            let mut msg = format!("Ambiguous prefix '{}': matches {} {}s:", prefix, n, entity);
            for row in &rows {
                msg.push_str(&format!("\n  {}", row.0));
            }
            bail!("{}", msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::ports::PlayerRepository;

    #[tokio::test]
    async fn test_full_uuid_resolves_without_lookup() {
        let pool = create_migrated_test_pool().await.unwrap();
        let id = Uuid::new_v4();
        // Not stored anywhere; the fast path never queries.
        assert_eq!(resolve_player_id(&pool, &id.to_string()).await.unwrap(), id);
    }

    #[tokio::test]
    async fn test_prefix_resolution_and_ambiguity() {
        let pool = create_migrated_test_pool().await.unwrap();
        let players = crate::adapters::sqlite::SqlitePlayerRepository::new(pool.clone());
        let id = Uuid::new_v4();
        players.ensure(id).await.unwrap();

        let prefix = &id.to_string()[..8];
        assert_eq!(resolve_player_id(&pool, prefix).await.unwrap(), id);

        assert!(resolve_player_id(&pool, "zz").await.is_err());
        assert!(resolve_player_id(&pool, "").await.is_err());
    }
}

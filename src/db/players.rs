//! The player record and its reward balance.

use super::{Database, now_str, optional};
use crate::error::{LedgerError, LedgerResult};
use crate::types::Player;
use rusqlite::{Connection, Row, params};

fn parse_player_row(row: &Row) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get("id")?,
        name: row.get("name")?,
        balance: row.get("balance")?,
        created_at: row.get("created_at")?,
    })
}

pub(crate) fn get_player_internal(conn: &Connection, player_id: i64) -> LedgerResult<Option<Player>> {
    let mut stmt =
        conn.prepare("SELECT id, name, balance, created_at FROM players WHERE id = ?1")?;
    optional(stmt.query_row(params![player_id], parse_player_row))
}

/// Add `amount` to a player's balance inside the caller's transaction.
pub(crate) fn credit_player_internal(
    conn: &Connection,
    player_id: i64,
    amount: i64,
) -> LedgerResult<()> {
    let updated = conn.execute(
        "UPDATE players SET balance = balance + ?1 WHERE id = ?2",
        params![amount, player_id],
    )?;
    if updated == 0 {
        return Err(LedgerError::player_not_found(player_id));
    }
    Ok(())
}

impl Database {
    /// Create the player if the table is empty; otherwise return the primary player.
    pub fn ensure_player(&self, name: &str, starting_balance: i64) -> LedgerResult<Player> {
        if let Some(player) = self.primary_player()? {
            return Ok(player);
        }
        let player = self.create_player(name, starting_balance)?;
        tracing::info!(player_id = player.id, name, "Seeded default player");
        Ok(player)
    }

    /// Insert a player unconditionally.
    pub fn create_player(&self, name: &str, starting_balance: i64) -> LedgerResult<Player> {
        let now = now_str();
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO players (name, balance, created_at) VALUES (?1, ?2, ?3)",
                params![name, starting_balance, now],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        self.get_player(id)?
            .ok_or_else(|| LedgerError::player_not_found(id))
    }

    pub fn get_player(&self, player_id: i64) -> LedgerResult<Option<Player>> {
        self.with_conn(|conn| get_player_internal(conn, player_id))
    }

    /// The single active player: the one with the lowest id.
    pub fn primary_player(&self) -> LedgerResult<Option<Player>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, balance, created_at FROM players ORDER BY id LIMIT 1",
            )?;
            optional(stmt.query_row([], parse_player_row))
        })
    }
}

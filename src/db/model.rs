use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{query, PgPool, Row};
use tokio_stream::StreamExt;

use crate::db::schema::{name_key, Ballot, Category, Entry, HeldVote, NewBallot, Vote, VoteKey, VotingContext};
use crate::engine::bucket::normalize_slot;

fn parse_id(raw: String) -> anyhow::Result<u64> {
    raw.parse::<u64>().map_err(|e| anyhow::anyhow!("invalid snowflake '{}': {}", raw, e))
}

fn ballot_from_row(r: &PgRow) -> anyhow::Result<Ballot> {
    Ok(Ballot {
        id: r.try_get("id")?,
        time_created: r.try_get("time_created")?,
        id_guild: parse_id(r.try_get("id_guild")?)?,
        name: r.try_get("name")?,
        open: r.try_get("open")?,
        expires_at: r.try_get("expires_at")?,
        boss_type: r.try_get::<String, _>("boss_type")?.parse()?,
        context: r.try_get::<String, _>("context")?.parse()?,
    })
}

fn entry_from_row(r: &PgRow) -> anyhow::Result<Entry> {
    Ok(Entry {
        id: r.try_get("id")?,
        id_ballot: r.try_get("id_ballot")?,
        name: r.try_get("name")?,
        name_key: r.try_get("name_key")?,
        category: r.try_get::<String, _>("category")?.parse()?,
        slot: r.try_get("slot")?,
    })
}

fn held_vote_from_row(r: &PgRow) -> anyhow::Result<HeldVote> {
    Ok(HeldVote {
        vote: Vote {
            id_ballot: r.try_get("id_ballot")?,
            id_entry: r.try_get("id_entry")?,
            id_user: parse_id(r.try_get("id_user")?)?,
            user_name: r.try_get("user_name")?,
            context: r.try_get::<String, _>("context")?.parse()?,
            time_cast: r.try_get("time_cast")?,
        },
        entry: Entry {
            id: r.try_get("id_entry")?,
            id_ballot: r.try_get("id_ballot")?,
            name: r.try_get("entry_name")?,
            name_key: r.try_get("entry_name_key")?,
            category: r.try_get::<String, _>("entry_category")?.parse()?,
            slot: r.try_get("entry_slot")?,
        },
        ballot_name: r.try_get("ballot_name")?,
    })
}

pub async fn get_ballot(conn: &PgPool, id_ballot: i32) -> anyhow::Result<Option<Ballot>> {
    let r = query("SELECT * FROM ballot WHERE id=$1;")
        .bind(id_ballot)
        .fetch_optional(conn)
        .await?;

    r.as_ref().map(ballot_from_row).transpose()
}

pub async fn find_ballot_by_name(conn: &PgPool, id_guild: u64, name: &str) -> anyhow::Result<Option<Ballot>> {
    let r = query("SELECT * FROM ballot WHERE id_guild=$1 AND LOWER(name)=$2 ORDER BY id DESC LIMIT 1;")
        .bind(id_guild.to_string())
        .bind(name_key(name))
        .fetch_optional(conn)
        .await?;

    r.as_ref().map(ballot_from_row).transpose()
}

pub async fn add_ballot(conn: &PgPool, ballot: &NewBallot) -> anyhow::Result<Ballot> {
    let r = query(
        "INSERT INTO ballot (time_created, id_guild, name, open, expires_at, boss_type, context)
         VALUES (NOW(), $1, $2, TRUE, $3, $4, $5)
         RETURNING *;")
        .bind(ballot.id_guild.to_string())
        .bind(ballot.name.trim())
        .bind(ballot.expires_at)
        .bind(ballot.boss_type.as_str())
        .bind(ballot.context.as_str())
        .fetch_one(conn)
        .await?;

    ballot_from_row(&r)
}

pub async fn close_ballot(conn: &PgPool, id_ballot: i32) -> anyhow::Result<bool> {
    let r = query("UPDATE ballot SET open=FALSE WHERE id=$1 AND open=TRUE;")
        .bind(id_ballot)
        .execute(conn)
        .await?;

    Ok(r.rows_affected() > 0)
}

/// Entries and votes go with the ballot through `ON DELETE CASCADE`.
pub async fn delete_ballot(conn: &PgPool, id_ballot: i32) -> anyhow::Result<bool> {
    let r = query("DELETE FROM ballot WHERE id=$1;")
        .bind(id_ballot)
        .execute(conn)
        .await?;

    Ok(r.rows_affected() > 0)
}

pub async fn close_expired_ballots(conn: &PgPool, now: DateTime<Utc>) -> anyhow::Result<Vec<Ballot>> {
    let mut stream = query(
        "UPDATE ballot SET open=FALSE
         WHERE open=TRUE AND expires_at IS NOT NULL AND expires_at < $1
         RETURNING *;")
        .bind(now)
        .fetch(conn);

    let mut result = Vec::new();
    while let Some(row) = stream.try_next().await? {
        result.push(ballot_from_row(&row)?);
    }

    Ok(result)
}

pub async fn get_entry(conn: &PgPool, id_entry: i32) -> anyhow::Result<Option<Entry>> {
    let r = query("SELECT * FROM entry WHERE id=$1;")
        .bind(id_entry)
        .fetch_optional(conn)
        .await?;

    r.as_ref().map(entry_from_row).transpose()
}

pub async fn find_entry_by_name(conn: &PgPool, id_ballot: i32, name: &str) -> anyhow::Result<Option<Entry>> {
    let r = query("SELECT * FROM entry WHERE id_ballot=$1 AND name_key=$2;")
        .bind(id_ballot)
        .bind(name_key(name))
        .fetch_optional(conn)
        .await?;

    r.as_ref().map(entry_from_row).transpose()
}

pub async fn upsert_entry(conn: &PgPool, id_ballot: i32, name: &str, category: Category, slot: &str) -> anyhow::Result<Entry> {
    let r = query(
        "INSERT INTO entry (id_ballot, name, name_key, category, slot)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (id_ballot, name_key)
         DO UPDATE SET name=EXCLUDED.name, category=EXCLUDED.category, slot=EXCLUDED.slot
         RETURNING *;")
        .bind(id_ballot)
        .bind(name.trim())
        .bind(name_key(name))
        .bind(category.as_str())
        .bind(normalize_slot(slot))
        .fetch_one(conn)
        .await?;

    entry_from_row(&r)
}

pub async fn list_open_votes_for_user(
    conn: &PgPool,
    id_guild: u64,
    id_user: u64,
    context: VotingContext,
) -> anyhow::Result<Vec<HeldVote>> {
    let mut stream = query(
        "SELECT v.id_ballot, v.id_entry, v.id_user, v.user_name, v.context, v.time_cast,
                e.name AS entry_name, e.name_key AS entry_name_key,
                e.category AS entry_category, e.slot AS entry_slot,
                b.name AS ballot_name
         FROM vote v
         JOIN entry e ON e.id = v.id_entry
         JOIN ballot b ON b.id = v.id_ballot
         WHERE b.id_guild=$1 AND b.open=TRUE AND v.id_user=$2 AND v.context=$3
         ORDER BY v.time_cast, v.id_ballot, v.id_entry;")
        .bind(id_guild.to_string())
        .bind(id_user.to_string())
        .bind(context.as_str())
        .fetch(conn);

    let mut result = Vec::new();
    while let Some(row) = stream.try_next().await? {
        result.push(held_vote_from_row(&row)?);
    }

    Ok(result)
}

pub async fn list_user_votes_in_ballot(conn: &PgPool, id_ballot: i32, id_user: u64) -> anyhow::Result<Vec<HeldVote>> {
    let mut stream = query(
        "SELECT v.id_ballot, v.id_entry, v.id_user, v.user_name, v.context, v.time_cast,
                e.name AS entry_name, e.name_key AS entry_name_key,
                e.category AS entry_category, e.slot AS entry_slot,
                b.name AS ballot_name
         FROM vote v
         JOIN entry e ON e.id = v.id_entry
         JOIN ballot b ON b.id = v.id_ballot
         WHERE v.id_ballot=$1 AND v.id_user=$2
         ORDER BY v.time_cast, v.id_entry;")
        .bind(id_ballot)
        .bind(id_user.to_string())
        .fetch(conn);

    let mut result = Vec::new();
    while let Some(row) = stream.try_next().await? {
        result.push(held_vote_from_row(&row)?);
    }

    Ok(result)
}

pub async fn add_vote(conn: &PgPool, vote: &Vote) -> anyhow::Result<bool> {
    let r = query(
        "INSERT INTO vote (id_ballot, id_entry, id_user, user_name, context, time_cast)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (id_ballot, id_entry, id_user, context) DO NOTHING;")
        .bind(vote.id_ballot)
        .bind(vote.id_entry)
        .bind(vote.id_user.to_string())
        .bind(&vote.user_name)
        .bind(vote.context.as_str())
        .bind(vote.time_cast)
        .execute(conn)
        .await?;

    Ok(r.rows_affected() == 1)
}

pub async fn remove_vote(conn: &PgPool, key: &VoteKey) -> anyhow::Result<u64> {
    let r = query("DELETE FROM vote WHERE id_ballot=$1 AND id_entry=$2 AND id_user=$3 AND context=$4;")
        .bind(key.id_ballot)
        .bind(key.id_entry)
        .bind(key.id_user.to_string())
        .bind(key.context.as_str())
        .execute(conn)
        .await?;

    Ok(r.rows_affected())
}

mod model;

pub use model::{
    AccessLevel, Attachment, ContentSegment, Message, MessageContent, NewMessage, Part,
    PartPayload, Role, ToolCallState,
};

use anyhow::anyhow;
use serde_json::Value;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AppError, AppResult};

fn now_unix_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Owns all chat persistence. Every mutation is an insert; rows are never
/// updated in place.
#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a room and the creator's owner membership as one unit. If the
    /// membership insert fails the room insert rolls back with it.
    pub async fn create_room(&self, owner_id: &str) -> AppResult<Uuid> {
        let room_id = Uuid::now_v7();

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO rooms (uuid) VALUES (?)")
            .bind(room_id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO room_members (room_uuid,user_id,level) VALUES (?,?,?)")
            .bind(room_id.to_string())
            .bind(owner_id)
            .bind(AccessLevel::Owner.as_i64())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(room_id)
    }

    pub async fn room_exists(&self, room_id: Uuid) -> AppResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM rooms WHERE uuid=?")
            .bind(room_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn is_member(&self, user_id: &str, room_id: Uuid) -> AppResult<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM room_members WHERE user_id=? AND room_uuid=?")
                .bind(user_id)
                .bind(room_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Rooms the user belongs to, newest first (uuid v7 sorts by time).
    pub async fn rooms_for_user(&self, user_id: &str) -> AppResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT room_uuid FROM room_members WHERE user_id=? ORDER BY room_uuid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rooms = Vec::with_capacity(rows.len());
        for (raw,) in rows {
            rooms.push(Uuid::parse_str(&raw).map_err(anyhow::Error::from)?);
        }
        Ok(rooms)
    }

    /// Append messages to a room in the given order. Each gets a fresh id
    /// and an insert-time timestamp; batch entries are offset by their index
    /// so a batch reads back in the order it was written. Zero confirmed
    /// inserts is a failure, and partial insertion rolls back entirely.
    pub async fn append_messages(
        &self,
        room_id: Uuid,
        messages: &[NewMessage],
    ) -> AppResult<Vec<Uuid>> {
        if messages.is_empty() {
            return Err(AppError::Persistence(
                "no message rows were inserted".to_owned(),
            ));
        }

        let base = now_unix_millis();
        let mut ids = Vec::with_capacity(messages.len());
        let mut inserted = 0u64;

        let mut tx = self.pool.begin().await?;
        for (index, message) in messages.iter().enumerate() {
            let id = Uuid::now_v7();
            let result = sqlx::query(
                "INSERT INTO messages (id,room_id,role,content,created_at,annotations,attachments) \
                 VALUES (?,?,?,?,?,?,?)",
            )
            .bind(id.to_string())
            .bind(room_id.to_string())
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(base + index as i64)
            .bind(serde_json::to_string(&message.annotations)?)
            .bind(serde_json::to_string(&message.attachments)?)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
            ids.push(id);
        }

        if inserted == 0 {
            return Err(AppError::Persistence(
                "no message rows were inserted".to_owned(),
            ));
        }
        tx.commit().await?;

        Ok(ids)
    }

    /// Full message log for a room, ascending by creation time. Pure read.
    pub async fn list_messages(&self, room_id: Uuid) -> AppResult<Vec<Message>> {
        let rows: Vec<(String, String, String, i64, String, String)> = sqlx::query_as(
            "SELECT id,role,content,created_at,annotations,attachments \
             FROM messages WHERE room_id=? ORDER BY created_at ASC, id ASC",
        )
        .bind(room_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for (id, role, content, created_at, annotations, attachments) in rows {
            messages.push(Message {
                id: Uuid::parse_str(&id).map_err(anyhow::Error::from)?,
                room_id,
                role: Role::parse(&role).ok_or_else(|| anyhow!("unknown role '{role}'"))?,
                content,
                created_at,
                annotations: serde_json::from_str(&annotations)?,
                attachments: serde_json::from_str(&attachments)?,
            });
        }
        Ok(messages)
    }

    /// Persist structured parts for a message, ordered by slice index. Each
    /// part row gets exactly one payload row matching its type, except step
    /// markers which carry none.
    pub async fn insert_parts(
        &self,
        message_id: Uuid,
        parts: &[PartPayload],
    ) -> AppResult<Vec<Uuid>> {
        let mut ids = Vec::with_capacity(parts.len());

        let mut tx = self.pool.begin().await?;
        let (next_order,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(\"order\")+1,0) FROM parts WHERE message_id=?")
                .bind(message_id.to_string())
                .fetch_one(&mut *tx)
                .await?;
        for (index, payload) in parts.iter().enumerate() {
            let id = Uuid::now_v7();
            sqlx::query("INSERT INTO parts (id,message_id,\"order\",type) VALUES (?,?,?,?)")
                .bind(id.to_string())
                .bind(message_id.to_string())
                .bind(next_order + index as i64)
                .bind(payload.kind())
                .execute(&mut *tx)
                .await?;

            match payload {
                PartPayload::Text { text } => {
                    sqlx::query("INSERT INTO text_parts (part_id,text) VALUES (?,?)")
                        .bind(id.to_string())
                        .bind(text)
                        .execute(&mut *tx)
                        .await?;
                }
                PartPayload::Reasoning { reasoning } => {
                    sqlx::query("INSERT INTO reasoning_parts (part_id,reasoning) VALUES (?,?)")
                        .bind(id.to_string())
                        .bind(reasoning)
                        .execute(&mut *tx)
                        .await?;
                }
                PartPayload::ToolInvocation {
                    tool_call_id,
                    tool_name,
                    state,
                    args,
                    result,
                } => {
                    sqlx::query(
                        "INSERT INTO tool_invocation_parts \
                         (part_id,tool_call_id,tool_name,state,args,result) VALUES (?,?,?,?,?,?)",
                    )
                    .bind(id.to_string())
                    .bind(tool_call_id)
                    .bind(tool_name)
                    .bind(state.as_str())
                    .bind(serde_json::to_string(args)?)
                    .bind(result.as_ref().map(serde_json::to_string).transpose()?)
                    .execute(&mut *tx)
                    .await?;
                }
                PartPayload::Source {
                    source_id,
                    url,
                    title,
                } => {
                    sqlx::query(
                        "INSERT INTO source_parts (part_id,source_id,url,title) VALUES (?,?,?,?)",
                    )
                    .bind(id.to_string())
                    .bind(source_id)
                    .bind(url)
                    .bind(title)
                    .execute(&mut *tx)
                    .await?;
                }
                PartPayload::StepStart => {}
            }

            ids.push(id);
        }
        tx.commit().await?;

        Ok(ids)
    }

    /// Parts of a message in reconstruction order.
    pub async fn list_parts(&self, message_id: Uuid) -> AppResult<Vec<Part>> {
        let rows: Vec<(String, i64, String)> = sqlx::query_as(
            "SELECT id,\"order\",type FROM parts WHERE message_id=? ORDER BY \"order\" ASC",
        )
        .bind(message_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut parts = Vec::with_capacity(rows.len());
        for (id, order, kind) in rows {
            let payload = self.load_payload(&id, &kind).await?;
            parts.push(Part {
                id: Uuid::parse_str(&id).map_err(anyhow::Error::from)?,
                message_id,
                order,
                payload,
            });
        }
        Ok(parts)
    }

    async fn load_payload(&self, part_id: &str, kind: &str) -> AppResult<PartPayload> {
        match kind {
            "text" => {
                let (text,): (String,) =
                    sqlx::query_as("SELECT text FROM text_parts WHERE part_id=?")
                        .bind(part_id)
                        .fetch_one(&self.pool)
                        .await?;
                Ok(PartPayload::Text { text })
            }
            "reasoning" => {
                let (reasoning,): (String,) =
                    sqlx::query_as("SELECT reasoning FROM reasoning_parts WHERE part_id=?")
                        .bind(part_id)
                        .fetch_one(&self.pool)
                        .await?;
                Ok(PartPayload::Reasoning { reasoning })
            }
            "tool_invocation" => {
                let (tool_call_id, tool_name, state, args, result): (
                    String,
                    String,
                    String,
                    String,
                    Option<String>,
                ) = sqlx::query_as(
                    "SELECT tool_call_id,tool_name,state,args,result \
                     FROM tool_invocation_parts WHERE part_id=?",
                )
                .bind(part_id)
                .fetch_one(&self.pool)
                .await?;
                Ok(PartPayload::ToolInvocation {
                    tool_call_id,
                    tool_name,
                    state: ToolCallState::parse(&state)
                        .ok_or_else(|| anyhow!("unknown tool call state '{state}'"))?,
                    args: serde_json::from_str::<Value>(&args)?,
                    result: result
                        .map(|raw| serde_json::from_str::<Value>(&raw))
                        .transpose()?,
                })
            }
            "source" => {
                let (source_id, url, title): (String, String, Option<String>) =
                    sqlx::query_as("SELECT source_id,url,title FROM source_parts WHERE part_id=?")
                        .bind(part_id)
                        .fetch_one(&self.pool)
                        .await?;
                Ok(PartPayload::Source {
                    source_id,
                    url,
                    title,
                })
            }
            "step_start" => Ok(PartPayload::StepStart),
            other => Err(AppError::Internal(anyhow!("unknown part type '{other}'"))),
        }
    }
}

//! Query helpers for the `agents` table.

use crate::StoreError;
use outdial_types::{Agent, CallStatus, LlmProviderId, SttProviderId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Parameters for creating a new agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAgent {
    pub name: String,
    pub system_prompt: String,
    pub llm_provider: LlmProviderId,
    pub llm_model: String,
    pub tts_voice_id: String,
    pub stt_provider: SttProviderId,
}

/// Parameters for updating an existing agent. `None` fields are left as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAgent {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
    pub llm_provider: Option<LlmProviderId>,
    pub llm_model: Option<String>,
    pub tts_voice_id: Option<String>,
    pub stt_provider: Option<SttProviderId>,
}

const AGENT_COLUMNS: &str = "id, name, system_prompt, llm_provider, llm_model,
    tts_voice_id, stt_provider, last_call_status, last_call_time";

fn map_row_to_agent(row: &Row) -> rusqlite::Result<Agent> {
    let llm_provider_str: String = row.get(3)?;
    let llm_provider: LlmProviderId = llm_provider_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let stt_provider_str: String = row.get(6)?;
    let stt_provider: SttProviderId = stt_provider_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let status_str: String = row.get(7)?;
    let last_call_status: CallStatus = status_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        system_prompt: row.get(2)?,
        llm_provider,
        llm_model: row.get(4)?,
        tts_voice_id: row.get(5)?,
        stt_provider,
        last_call_status,
        last_call_time: row.get(8)?,
    })
}

/// Creates a new agent and returns the stored row.
pub fn create_agent(conn: &Connection, params: &NewAgent) -> Result<Agent, StoreError> {
    conn.execute(
        "INSERT INTO agents (name, system_prompt, llm_provider, llm_model, tts_voice_id, stt_provider)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            params.name,
            params.system_prompt,
            params.llm_provider.as_str(),
            params.llm_model,
            params.tts_voice_id,
            params.stt_provider.as_str(),
        ],
    )?;
    get_agent(conn, conn.last_insert_rowid())
}

/// Retrieves an agent by ID.
pub fn get_agent(conn: &Connection, agent_id: i64) -> Result<Agent, StoreError> {
    conn.query_row(
        &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
        [agent_id],
        map_row_to_agent,
    )
    .optional()?
    .ok_or(StoreError::NotFound("agent", agent_id))
}

/// Lists all agents in creation order.
pub fn list_agents(conn: &Connection) -> Result<Vec<Agent>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {AGENT_COLUMNS} FROM agents ORDER BY id ASC"))?;
    let rows = stmt.query_map([], map_row_to_agent)?;
    let mut agents = Vec::new();
    for row in rows {
        agents.push(row?);
    }
    Ok(agents)
}

/// Applies a partial update to an agent and returns the stored row.
pub fn update_agent(
    conn: &Connection,
    agent_id: i64,
    update: &UpdateAgent,
) -> Result<Agent, StoreError> {
    let current = get_agent(conn, agent_id)?;

    conn.execute(
        "UPDATE agents SET name = ?1, system_prompt = ?2, llm_provider = ?3,
         llm_model = ?4, tts_voice_id = ?5, stt_provider = ?6 WHERE id = ?7",
        params![
            update.name.as_ref().unwrap_or(&current.name),
            update
                .system_prompt
                .as_ref()
                .unwrap_or(&current.system_prompt),
            update.llm_provider.unwrap_or(current.llm_provider).as_str(),
            update.llm_model.as_ref().unwrap_or(&current.llm_model),
            update
                .tts_voice_id
                .as_ref()
                .unwrap_or(&current.tts_voice_id),
            update.stt_provider.unwrap_or(current.stt_provider).as_str(),
            agent_id,
        ],
    )?;
    get_agent(conn, agent_id)
}

/// Writes the agent's last-call status.
///
/// Moving to `calling` also stamps `last_call_time`; other transitions leave
/// the timestamp of the attempt in place. Last-writer-wins by design:
/// concurrent campaigns sharing one agent race on this field, and the data
/// model does not disambiguate which campaign set it.
pub fn update_agent_call_status(
    conn: &Connection,
    agent_id: i64,
    status: CallStatus,
) -> Result<(), StoreError> {
    let changed = if status == CallStatus::Calling {
        conn.execute(
            "UPDATE agents SET last_call_status = ?1, last_call_time = datetime('now')
             WHERE id = ?2",
            params![status.as_str(), agent_id],
        )?
    } else {
        conn.execute(
            "UPDATE agents SET last_call_status = ?1 WHERE id = ?2",
            params![status.as_str(), agent_id],
        )?
    };

    if changed == 0 {
        return Err(StoreError::NotFound("agent", agent_id));
    }
    Ok(())
}

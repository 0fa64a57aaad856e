//! Query helpers for the `call_logs` table.

use crate::StoreError;
use outdial_types::{CallLog, CallStatus};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

/// Parameters for recording a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCallLog {
    pub agent_id: i64,
    pub phone_number: String,
    pub call_sid: Option<String>,
    pub status: CallStatus,
}

fn map_row_to_call_log(row: &Row) -> rusqlite::Result<CallLog> {
    let status_str: String = row.get(4)?;
    let status: CallStatus = status_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(CallLog {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        phone_number: row.get(2)?,
        call_sid: row.get(3)?,
        status,
        created_at: row.get(5)?,
    })
}

/// Records a call and returns the stored row.
pub fn create_call_log(conn: &Connection, params: &NewCallLog) -> Result<CallLog, StoreError> {
    conn.execute(
        "INSERT INTO call_logs (agent_id, phone_number, call_sid, status)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            params.agent_id,
            params.phone_number,
            params.call_sid,
            params.status.as_str(),
        ],
    )?;

    conn.query_row(
        "SELECT id, agent_id, phone_number, call_sid, status, created_at
         FROM call_logs WHERE id = ?1",
        [conn.last_insert_rowid()],
        map_row_to_call_log,
    )
    .map_err(StoreError::Database)
}

/// Lists call logs, newest first, optionally filtered by agent.
pub fn list_call_logs(
    conn: &Connection,
    agent_id: Option<i64>,
) -> Result<Vec<CallLog>, StoreError> {
    let mut logs = Vec::new();
    match agent_id {
        Some(agent_id) => {
            let mut stmt = conn.prepare(
                "SELECT id, agent_id, phone_number, call_sid, status, created_at
                 FROM call_logs WHERE agent_id = ?1 ORDER BY id DESC",
            )?;
            let rows = stmt.query_map([agent_id], map_row_to_call_log)?;
            for row in rows {
                logs.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, agent_id, phone_number, call_sid, status, created_at
                 FROM call_logs ORDER BY id DESC",
            )?;
            let rows = stmt.query_map([], map_row_to_call_log)?;
            for row in rows {
                logs.push(row?);
            }
        }
    }
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_agent, run_migrations, NewAgent};
    use outdial_types::{LlmProviderId, SttProviderId};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");
        conn
    }

    #[test]
    fn create_and_list_call_logs() {
        let conn = test_conn();
        let agent = create_agent(
            &conn,
            &NewAgent {
                name: "Alex".to_string(),
                system_prompt: "p".to_string(),
                llm_provider: LlmProviderId::Groq,
                llm_model: "llama-3.1-8b-instant".to_string(),
                tts_voice_id: "v".to_string(),
                stt_provider: SttProviderId::Gemini,
            },
        )
        .unwrap();

        let first = create_call_log(
            &conn,
            &NewCallLog {
                agent_id: agent.id,
                phone_number: "+15550000001".to_string(),
                call_sid: Some("CA123".to_string()),
                status: CallStatus::Completed,
            },
        )
        .unwrap();
        assert_eq!(first.call_sid.as_deref(), Some("CA123"));

        create_call_log(
            &conn,
            &NewCallLog {
                agent_id: agent.id,
                phone_number: "+15550000002".to_string(),
                call_sid: None,
                status: CallStatus::Failed,
            },
        )
        .unwrap();

        let logs = list_call_logs(&conn, Some(agent.id)).unwrap();
        assert_eq!(logs.len(), 2);
        // Newest first.
        assert_eq!(logs[0].phone_number, "+15550000002");
        assert_eq!(logs[1].phone_number, "+15550000001");

        assert_eq!(list_call_logs(&conn, Some(agent.id + 1)).unwrap().len(), 0);
        assert_eq!(list_call_logs(&conn, None).unwrap().len(), 2);
    }
}

//! Query helpers for the `campaigns` and `contacts` tables.

use crate::StoreError;
use outdial_types::{Campaign, CampaignStatus, Contact, ContactStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Parameters for creating a new campaign with its contact list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    pub agent_id: i64,
    /// Phone numbers in dial order.
    pub contacts: Vec<String>,
}

/// Per-status contact counts for one campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub pending: usize,
    pub calling: usize,
    pub completed: usize,
    pub failed: usize,
}

fn map_row_to_campaign(row: &Row) -> rusqlite::Result<Campaign> {
    let status_str: String = row.get(3)?;
    let status: CampaignStatus = status_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Campaign {
        id: row.get(0)?,
        name: row.get(1)?,
        agent_id: row.get(2)?,
        status,
        created_at: row.get(4)?,
    })
}

fn map_row_to_contact(row: &Row) -> rusqlite::Result<Contact> {
    let status_str: String = row.get(3)?;
    let status: ContactStatus = status_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Contact {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        phone_number: row.get(2)?,
        status,
    })
}

/// Creates a campaign and its contact rows in one transaction.
///
/// The agent must exist (enforced by the foreign key). Contacts are inserted
/// in the given order so dialing in ascending id order preserves list order.
pub fn create_campaign(conn: &Connection, params: &NewCampaign) -> Result<Campaign, StoreError> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO campaigns (name, agent_id) VALUES (?1, ?2)",
        rusqlite::params![params.name, params.agent_id],
    )?;
    let campaign_id = tx.last_insert_rowid();

    {
        let mut stmt =
            tx.prepare("INSERT INTO contacts (campaign_id, phone_number) VALUES (?1, ?2)")?;
        for number in &params.contacts {
            stmt.execute(rusqlite::params![campaign_id, number])?;
        }
    }

    tx.commit()?;
    get_campaign(conn, campaign_id)
}

/// Retrieves a campaign by ID.
pub fn get_campaign(conn: &Connection, campaign_id: i64) -> Result<Campaign, StoreError> {
    conn.query_row(
        "SELECT id, name, agent_id, status, created_at FROM campaigns WHERE id = ?1",
        [campaign_id],
        map_row_to_campaign,
    )
    .optional()?
    .ok_or(StoreError::NotFound("campaign", campaign_id))
}

/// Lists all campaigns in creation order.
pub fn list_campaigns(conn: &Connection) -> Result<Vec<Campaign>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT id, name, agent_id, status, created_at FROM campaigns ORDER BY id ASC")?;
    let rows = stmt.query_map([], map_row_to_campaign)?;
    let mut campaigns = Vec::new();
    for row in rows {
        campaigns.push(row?);
    }
    Ok(campaigns)
}

/// Lists a campaign's contacts in dial order.
pub fn list_contacts(conn: &Connection, campaign_id: i64) -> Result<Vec<Contact>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, campaign_id, phone_number, status FROM contacts
         WHERE campaign_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([campaign_id], map_row_to_contact)?;
    let mut contacts = Vec::new();
    for row in rows {
        contacts.push(row?);
    }
    Ok(contacts)
}

/// Sets a campaign's lifecycle status.
pub fn set_campaign_status(
    conn: &Connection,
    campaign_id: i64,
    status: CampaignStatus,
) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE campaigns SET status = ?1 WHERE id = ?2",
        params![status.as_str(), campaign_id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound("campaign", campaign_id));
    }
    Ok(())
}

/// Sets a contact's dialing status.
pub fn set_contact_status(
    conn: &Connection,
    contact_id: i64,
    status: ContactStatus,
) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE contacts SET status = ?1 WHERE id = ?2",
        params![status.as_str(), contact_id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound("contact", contact_id));
    }
    Ok(())
}

/// Moves every `calling` contact with the given number to a terminal status.
///
/// Used by the telephony status callback, which knows the dialed number but
/// not the contact row. Returns the number of rows updated; zero is not an
/// error (the call may have been placed outside any campaign).
pub fn resolve_calling_contact(
    conn: &Connection,
    phone_number: &str,
    status: ContactStatus,
) -> Result<usize, StoreError> {
    let changed = conn.execute(
        "UPDATE contacts SET status = ?1 WHERE phone_number = ?2 AND status = 'calling'",
        params![status.as_str(), phone_number],
    )?;
    Ok(changed)
}

/// Counts a campaign's contacts by status.
pub fn campaign_status_breakdown(
    conn: &Connection,
    campaign_id: i64,
) -> Result<StatusBreakdown, StoreError> {
    let mut breakdown = StatusBreakdown::default();
    for contact in list_contacts(conn, campaign_id)? {
        match contact.status {
            ContactStatus::Pending => breakdown.pending += 1,
            ContactStatus::Calling => breakdown.calling += 1,
            ContactStatus::Completed => breakdown.completed += 1,
            ContactStatus::Failed => breakdown.failed += 1,
        }
    }
    Ok(breakdown)
}

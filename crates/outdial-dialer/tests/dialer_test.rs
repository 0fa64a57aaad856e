//! End-to-end dialer runs against an on-disk SQLite database.

use outdial_db::{create_pool, DbPool, DbRuntimeSettings, NewAgent, NewCampaign};
use outdial_dialer::{Dialer, DialerConfig, DialerError};
use outdial_types::{CallStatus, CampaignStatus, ContactStatus, LlmProviderId, SttProviderId};
use std::time::Duration;

struct Fixture {
    pool: DbPool,
    // Held so the database file outlives the test body.
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let db_path = dir.path().join("dialer_test.db");
    let db_path = db_path.to_str().expect("temp path should be utf-8");
    let pool = create_pool(db_path, DbRuntimeSettings::default()).expect("should create pool");
    {
        let conn = pool.get().expect("should get connection");
        outdial_db::run_migrations(&conn).expect("migrations should succeed");
    }
    Fixture { pool, _dir: dir }
}

fn seed_campaign(pool: &DbPool, contacts: &[&str]) -> (i64, i64) {
    let conn = pool.get().expect("should get connection");
    let agent = outdial_db::create_agent(
        &conn,
        &NewAgent {
            name: "Alex".to_string(),
            system_prompt: "You are Alex.".to_string(),
            llm_provider: LlmProviderId::Gemini,
            llm_model: "gemini-1.5-flash".to_string(),
            tts_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            stt_provider: SttProviderId::Deepgram,
        },
    )
    .expect("should create agent");

    let campaign = outdial_db::create_campaign(
        &conn,
        &NewCampaign {
            name: "Outreach".to_string(),
            agent_id: agent.id,
            contacts: contacts.iter().map(|s| s.to_string()).collect(),
        },
    )
    .expect("should create campaign");

    (agent.id, campaign.id)
}

fn campaign_status(pool: &DbPool, campaign_id: i64) -> CampaignStatus {
    let conn = pool.get().expect("should get connection");
    outdial_db::get_campaign(&conn, campaign_id)
        .expect("campaign should exist")
        .status
}

async fn wait_until_settled(pool: &DbPool, campaign_id: i64) -> CampaignStatus {
    // The poll sleep advances paused test time, so callers asserting on
    // elapsed virtual time must leave slack for these ticks.
    for _ in 0..10_000 {
        let status = campaign_status(pool, campaign_id);
        if status != CampaignStatus::Running {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("campaign {campaign_id} never left the running state");
}

fn quick_sim_config(success_rate: f64) -> DialerConfig {
    DialerConfig {
        simulation: true,
        simulated_call_duration: Duration::from_secs(3),
        simulated_inter_call_delay: Duration::from_secs(5),
        success_rate,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn simulated_run_completes_every_contact() {
    let fx = fixture();
    let (agent_id, campaign_id) = seed_campaign(&fx.pool, &["+15550000001", "+15550000002"]);

    let dialer = Dialer::spawn(fx.pool.clone(), None, quick_sim_config(1.0));
    let started = tokio::time::Instant::now();

    let receipt = dialer.enqueue(campaign_id).await.expect("should enqueue");
    assert_eq!(receipt.contacts, 2);
    assert!(receipt.simulation);
    assert_eq!(campaign_status(&fx.pool, campaign_id), CampaignStatus::Running);

    let status = wait_until_settled(&fx.pool, campaign_id).await;
    assert_eq!(status, CampaignStatus::Completed);

    // Two simulated calls plus one inter-call pause; the pause is skipped
    // after the final contact.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(11), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(16), "elapsed {elapsed:?}");

    let conn = fx.pool.get().expect("should get connection");
    let contacts = outdial_db::list_contacts(&conn, campaign_id).expect("should list contacts");
    assert!(contacts.iter().all(|c| c.status == ContactStatus::Completed));

    let agent = outdial_db::get_agent(&conn, agent_id).expect("agent should exist");
    assert_eq!(agent.last_call_status, CallStatus::Idle);
    assert!(agent.last_call_time.is_some(), "dialing stamps the call time");

    assert!(dialer.active_runs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_calls_do_not_stop_the_run() {
    let fx = fixture();
    let (agent_id, campaign_id) =
        seed_campaign(&fx.pool, &["+15550000001", "+15550000002", "+15550000003"]);

    let dialer = Dialer::spawn(fx.pool.clone(), None, quick_sim_config(0.0));
    dialer.enqueue(campaign_id).await.expect("should enqueue");

    let status = wait_until_settled(&fx.pool, campaign_id).await;
    assert_eq!(status, CampaignStatus::Completed);

    let conn = fx.pool.get().expect("should get connection");
    let contacts = outdial_db::list_contacts(&conn, campaign_id).expect("should list contacts");
    assert_eq!(contacts.len(), 3);
    assert!(contacts.iter().all(|c| c.status == ContactStatus::Failed));

    let agent = outdial_db::get_agent(&conn, agent_id).expect("agent should exist");
    assert_eq!(agent.last_call_status, CallStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn duplicate_enqueue_is_rejected_while_active() {
    let fx = fixture();
    let (_, campaign_id) = seed_campaign(&fx.pool, &["+15550000001", "+15550000002"]);

    let dialer = Dialer::spawn(fx.pool.clone(), None, quick_sim_config(1.0));
    dialer.enqueue(campaign_id).await.expect("should enqueue");

    match dialer.enqueue(campaign_id).await {
        Err(DialerError::AlreadyActive(id)) => assert_eq!(id, campaign_id),
        other => panic!("unexpected result: {other:?}"),
    }

    // Once the run drains, the campaign is schedulable again.
    wait_until_settled(&fx.pool, campaign_id).await;
    dialer
        .enqueue(campaign_id)
        .await
        .expect("finished campaign should be schedulable again");
}

#[tokio::test(start_paused = true)]
async fn enqueue_missing_campaign_fails_without_registering() {
    let fx = fixture();
    let dialer = Dialer::spawn(fx.pool.clone(), None, quick_sim_config(1.0));

    match dialer.enqueue(99).await {
        Err(DialerError::Store(outdial_db::StoreError::NotFound("campaign", 99))) => {}
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(dialer.active_runs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn queue_full_rejection_resets_campaign_status() {
    let fx = fixture();
    let (_, first_id) = seed_campaign(
        &fx.pool,
        &["+15550000001", "+15550000002", "+15550000003"],
    );
    let (_, second_id) = seed_campaign(&fx.pool, &["+15550000011"]);
    let (_, third_id) = seed_campaign(&fx.pool, &["+15550000021"]);

    // One worker and a single queue slot: the first run occupies the worker,
    // the second fills the queue, the third has nowhere to go.
    let config = DialerConfig {
        workers: 1,
        queue_capacity: 1,
        ..quick_sim_config(1.0)
    };
    let dialer = Dialer::spawn(fx.pool.clone(), None, config);

    dialer.enqueue(first_id).await.expect("should enqueue first");
    dialer
        .enqueue(second_id)
        .await
        .expect("should enqueue second");

    match dialer.enqueue(third_id).await {
        Err(DialerError::QueueFull(id)) => assert_eq!(id, third_id),
        other => panic!("unexpected result: {other:?}"),
    }

    // A rejected campaign must not read as active in any view.
    assert_eq!(campaign_status(&fx.pool, third_id), CampaignStatus::Pending);
    assert_eq!(dialer.active_runs().len(), 2);
    assert!(dialer
        .active_runs()
        .iter()
        .all(|run| run.campaign_id != third_id));

    wait_until_settled(&fx.pool, first_id).await;
    wait_until_settled(&fx.pool, second_id).await;
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_queued_run_leaves_contacts_pending() {
    let fx = fixture();
    let (_, first_id) = seed_campaign(&fx.pool, &["+15550000001", "+15550000002"]);
    let (_, second_id) = seed_campaign(&fx.pool, &["+15550000011", "+15550000012"]);

    // One worker: the second campaign waits in the queue behind the first.
    let config = DialerConfig {
        workers: 1,
        ..quick_sim_config(1.0)
    };
    let dialer = Dialer::spawn(fx.pool.clone(), None, config);

    dialer.enqueue(first_id).await.expect("should enqueue first");
    dialer
        .enqueue(second_id)
        .await
        .expect("should enqueue second");
    assert_eq!(dialer.active_runs().len(), 2);

    assert!(dialer.cancel(second_id));
    assert!(!dialer.cancel(999), "unknown campaign has no run to cancel");

    assert_eq!(
        wait_until_settled(&fx.pool, first_id).await,
        CampaignStatus::Completed
    );
    assert_eq!(
        wait_until_settled(&fx.pool, second_id).await,
        CampaignStatus::Cancelled
    );

    // Cancellation fires before the first contact, so none were dialed.
    let conn = fx.pool.get().expect("should get connection");
    let contacts = outdial_db::list_contacts(&conn, second_id).expect("should list contacts");
    assert!(contacts.iter().all(|c| c.status == ContactStatus::Pending));

    assert!(dialer.active_runs().is_empty());
}

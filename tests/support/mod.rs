#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;
use vigil::application::context::{ContextOptions, InspectionContext};
use vigil::application::defects::{DefectError, DefectsGateway};
use vigil::application::remote::{RemoteApi, RemoteError};
use vigil::domain::entities::Actor;
use vigil::domain::lifecycle::InspectionDraft;
use vigil::domain::templates::{ChecklistItem, TemplateContent, TemplateRecord};
use vigil::domain::types::{ItemType, Role, Severity};
use vigil::infra::db::SqliteRepositories;
use vigil_api_types::{OutboxEnvelope, SyncAck};

/// Scriptable server of record.
#[derive(Default)]
pub struct FakeRemote {
    offline: AtomicBool,
    disconnect_next: AtomicBool,
    delay: Mutex<Option<Duration>>,
    scripted: Mutex<VecDeque<RemoteError>>,
    rejected: Mutex<HashMap<Uuid, RemoteError>>,
    stale_unless_forced: Mutex<HashSet<Uuid>>,
    sent: Mutex<Vec<OutboxEnvelope>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Fail the next send with `error`, whichever record it carries.
    pub fn fail_next(&self, error: RemoteError) {
        self.scripted.lock().unwrap().push_back(error);
    }

    /// Go offline while the next send is in flight.
    pub fn disconnect_on_next_send(&self) {
        self.disconnect_next.store(true, Ordering::SeqCst);
    }

    pub fn reject_record(&self, record_id: Uuid, error: RemoteError) {
        self.rejected.lock().unwrap().insert(record_id, error);
    }

    pub fn accept_record(&self, record_id: Uuid) {
        self.rejected.lock().unwrap().remove(&record_id);
        self.stale_unless_forced.lock().unwrap().remove(&record_id);
    }

    pub fn stale_unless_forced(&self, record_id: Uuid) {
        self.stale_unless_forced.lock().unwrap().insert(record_id);
    }

    pub fn sent(&self) -> Vec<OutboxEnvelope> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_for(&self, record_id: Uuid) -> Vec<OutboxEnvelope> {
        self.sent()
            .into_iter()
            .filter(|envelope| envelope.record_id == record_id)
            .collect()
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn is_online(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    async fn send(&self, envelope: &OutboxEnvelope) -> Result<SyncAck, RemoteError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(envelope.clone());

        if self.disconnect_next.swap(false, Ordering::SeqCst) {
            self.set_online(false);
            return Err(RemoteError::Network("connection reset".into()));
        }
        if let Some(error) = self.scripted.lock().unwrap().pop_front() {
            return Err(error);
        }
        if let Some(error) = self.rejected.lock().unwrap().get(&envelope.record_id) {
            return Err(error.clone());
        }
        if !envelope.force
            && self
                .stale_unless_forced
                .lock()
                .unwrap()
                .contains(&envelope.record_id)
        {
            return Err(RemoteError::StaleState(format!(
                "{} was edited on the server",
                envelope.record_code
            )));
        }

        Ok(SyncAck {
            mutation_id: envelope.mutation_id,
            record_id: envelope.record_id,
            remote_revision: Some(u64::from(envelope.revision_number) + 1),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaisedDefect {
    pub inspection_id: Uuid,
    pub item_id: String,
    pub severity: Severity,
    pub compliance_tag: Option<String>,
}

#[derive(Default)]
pub struct FakeDefects {
    unavailable: AtomicBool,
    raised: Mutex<Vec<RaisedDefect>>,
}

impl FakeDefects {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn raised(&self) -> Vec<RaisedDefect> {
        self.raised.lock().unwrap().clone()
    }
}

#[async_trait]
impl DefectsGateway for FakeDefects {
    async fn create_defect_from_failed_item(
        &self,
        inspection_id: Uuid,
        item_id: &str,
        severity: Severity,
        compliance_tag: Option<&str>,
    ) -> Result<Uuid, DefectError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DefectError::Unavailable("defects service is down".into()));
        }
        self.raised.lock().unwrap().push(RaisedDefect {
            inspection_id,
            item_id: item_id.to_string(),
            severity,
            compliance_tag: compliance_tag.map(str::to_string),
        });
        Ok(Uuid::new_v4())
    }
}

pub struct Harness {
    pub repositories: Arc<SqliteRepositories>,
    pub remote: Arc<FakeRemote>,
    pub defects: Arc<FakeDefects>,
    pub context: InspectionContext,
}

impl Harness {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_options(pool, ContextOptions::default())
    }

    pub fn with_options(pool: SqlitePool, options: ContextOptions) -> Self {
        let repositories = Arc::new(SqliteRepositories::new(pool));
        let remote = FakeRemote::new();
        let defects = FakeDefects::new();
        let context = InspectionContext::new(
            repositories.stores(),
            remote.clone() as Arc<dyn RemoteApi>,
            defects.clone() as Arc<dyn DefectsGateway>,
            options,
        );
        Self {
            repositories,
            remote,
            defects,
            context,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.repositories.pool()
    }

    /// Create and publish a template with the given items.
    pub async fn published_template(&self, name: &str, items: Vec<ChecklistItem>) -> TemplateRecord {
        let templates = self.context.templates();
        let draft = templates
            .create(
                &manager(),
                TemplateContent {
                    name: name.to_string(),
                    items,
                    ..TemplateContent::default()
                },
            )
            .await
            .expect("create template draft");
        templates
            .publish(&manager(), draft.id, None)
            .await
            .expect("publish template")
    }

    pub async fn basic_template(&self) -> TemplateRecord {
        self.published_template(
            "Ladder check",
            vec![
                check_item("rungs", true, false),
                check_item("feet", true, true),
                check_item("label", false, false),
            ],
        )
        .await
    }
}

pub fn actor(role: Role, name: &str) -> Actor {
    Actor::new(Uuid::new_v4(), name, role)
}

pub fn fitter() -> Actor {
    Actor::new(
        Uuid::from_u128(0x0f17_7e40_0000_4000_8000_0000_0000_0001),
        "Fran Fitter",
        Role::Fitter,
    )
}

pub fn supervisor() -> Actor {
    Actor::new(
        Uuid::from_u128(0x5be7_0000_0000_4000_8000_0000_0000_0002),
        "Sam Supervisor",
        Role::Supervisor,
    )
}

pub fn manager() -> Actor {
    Actor::new(
        Uuid::from_u128(0x3a4a_0000_0000_4000_8000_0000_0000_0003),
        "Morgan Manager",
        Role::Manager,
    )
}

pub fn admin() -> Actor {
    Actor::new(
        Uuid::from_u128(0xad31_0000_0000_4000_8000_0000_0000_0004),
        "Alex Admin",
        Role::Admin,
    )
}

pub fn viewer() -> Actor {
    Actor::new(
        Uuid::from_u128(0x71e3_0000_0000_4000_8000_0000_0000_0005),
        "Vic Viewer",
        Role::Viewer,
    )
}

pub fn check_item(id: &str, required: bool, critical: bool) -> ChecklistItem {
    ChecklistItem {
        id: id.to_string(),
        section_id: None,
        question: format!("Is the {id} sound?"),
        item_type: ItemType::PassFail,
        required,
        critical,
        bounds: None,
        unit: None,
        photo_required_on_fail: false,
        create_defect_on_fail: false,
        defect_severity: None,
        compliance_tag: None,
        order: 0,
    }
}

pub fn draft_for(template_id: Uuid) -> InspectionDraft {
    InspectionDraft {
        template_id,
        asset_id: Some(Uuid::new_v4()),
        ..InspectionDraft::default()
    }
}

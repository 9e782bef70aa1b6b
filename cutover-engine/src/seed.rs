//! Staging pilot dataset for rehearsing a full cutover.
//!
//! Training collections go to module paths by default. With
//! [`SeedLayout::Legacy`] they go to legacy paths instead, so backfill,
//! the read cutover report and retirement can be rehearsed end to end.

use std::sync::Arc;

use chrono::Utc;
use cutover_core::{
    CollectionName, CollectionPath, CutoverResult, Document, DocumentId, DocumentPath,
    MigrationConfig, OrgId, SeedSummary, SeedTotals,
};
use cutover_storage::{DocumentStore, WriteOp};
use serde_json::{json, Value};

use crate::batch::BatchWriter;

/// Where the training collections are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeedLayout {
    #[default]
    Module,
    Legacy,
}

const CREATED_AT: &str = "2026-01-10T09:00:00.000Z";
const UPDATED_AT: &str = "2026-02-15T12:00:00.000Z";
const CALCULATED_AT: &str = "2026-02-15T12:05:00.000Z";
const SCHOOL_NORTH: &str = "school_north";
const SCHOOL_SOUTH: &str = "school_south";

struct SeedDoc {
    id: &'static str,
    data: Value,
}

fn stamped(mut data: Value) -> Value {
    if let Value::Object(map) = &mut data {
        map.insert("createdAt".to_string(), json!(CREATED_AT));
        map.insert("updatedAt".to_string(), json!(UPDATED_AT));
    }
    data
}

fn schools() -> Vec<SeedDoc> {
    vec![
        SeedDoc {
            id: SCHOOL_NORTH,
            data: stamped(json!({"name": "Northview Primary", "code": "NVP", "status": "active"})),
        },
        SeedDoc {
            id: SCHOOL_SOUTH,
            data: stamped(json!({"name": "Southfield Primary", "code": "SFP", "status": "active"})),
        },
    ]
}

fn users(org: &OrgId, module: &str) -> Vec<SeedDoc> {
    let user = |id: &'static str, name: &str, email: &str, role: &str, schools: Option<&str>| {
        let mut data = json!({
            "uid": id,
            "fullName": name,
            "email": email,
            "role": role,
            "orgId": org.as_str(),
            "enabledModules": [module],
            "isActive": true,
        });
        if let Some(school) = schools {
            data["schoolIds"] = json!([school]);
        }
        SeedDoc {
            id,
            data: stamped(data),
        }
    };
    vec![
        user("stg_org_admin_1", "Olivia Morgan", "olivia.morgan@example.org", "org_admin", None),
        user(
            "stg_school_admin_1",
            "Noah Patel",
            "noah.patel@example.org",
            "school_admin",
            Some(SCHOOL_NORTH),
        ),
        user(
            "stg_viewer_1",
            "Ava Turner",
            "ava.turner@example.org",
            "viewer",
            Some(SCHOOL_SOUTH),
        ),
    ]
}

fn staff() -> Vec<SeedDoc> {
    let person = |id: &'static str, name: &str, email: &str, school: &str, role: &str, title: &str| {
        SeedDoc {
            id,
            data: stamped(json!({
                "fullName": name,
                "email": email,
                "schoolIds": [school],
                "employmentRole": role,
                "jobTitle": title,
                "isActive": true,
            })),
        }
    };
    vec![
        person("staff_alice", "Alice Carter", "alice.carter@example.org", SCHOOL_NORTH, "teacher", "Year 6 Teacher"),
        person("staff_ben", "Ben Holmes", "ben.holmes@example.org", SCHOOL_NORTH, "support", "Teaching Assistant"),
        person("staff_chloe", "Chloe Reed", "chloe.reed@example.org", SCHOOL_SOUTH, "teacher", "Science Teacher"),
        person("staff_dan", "Dan Lewis", "dan.lewis@example.org", SCHOOL_SOUTH, "admin", "Office Administrator"),
    ]
}

fn training_types() -> Vec<SeedDoc> {
    let kind = |id: &'static str, name: &str, code: &str, days: u32, roles: &[&str]| SeedDoc {
        id,
        data: stamped(json!({
            "name": name,
            "code": code,
            "expires": true,
            "defaultValidityDays": days,
            "required": true,
            "requiredForRoles": roles,
        })),
    };
    vec![
        kind("tt_safeguarding", "Safeguarding Level 1", "SAFE-L1", 365, &["teacher", "support", "admin"]),
        kind("tt_first_aid", "First Aid", "FA-STD", 1095, &["teacher", "support"]),
        kind("tt_fire_safety", "Fire Safety", "FIRE-ANNUAL", 365, &["teacher", "support", "admin"]),
    ]
}

fn training_records() -> Vec<SeedDoc> {
    #[allow(clippy::too_many_arguments)]
    fn record(
        id: &'static str,
        staff: &str,
        school: &str,
        kind: &str,
        issued: &str,
        expires: &str,
        provider: &str,
        notes: &str,
        status: &str,
        days_to_expiry: i64,
    ) -> SeedDoc {
        SeedDoc {
            id,
            data: stamped(json!({
                "staffId": staff,
                "schoolId": school,
                "trainingTypeId": kind,
                "issuedAt": format!("{}T00:00:00.000Z", issued),
                "expiresAt": format!("{}T00:00:00.000Z", expires),
                "provider": provider,
                "notes": notes,
                "createdBy": "seed-script",
                "status": status,
                "daysToExpiry": days_to_expiry,
            })),
        }
    }
    const N: &str = SCHOOL_NORTH;
    const S: &str = SCHOOL_SOUTH;
    vec![
        record("rec_alice_safe", "staff_alice", N, "tt_safeguarding", "2025-12-01", "2026-12-01", "EduSafe UK", "Annual refresher", "valid", 290),
        record("rec_alice_fire", "staff_alice", N, "tt_fire_safety", "2025-02-20", "2026-02-20", "SafeCampus", "Due soon", "expiring", 5),
        record("rec_ben_safe", "staff_ben", N, "tt_safeguarding", "2024-01-10", "2025-01-10", "EduSafe UK", "Expired record", "expired", -401),
        record("rec_ben_firstaid", "staff_ben", N, "tt_first_aid", "2025-01-15", "2028-01-15", "St John", "Current", "valid", 699),
        record("rec_chloe_safe", "staff_chloe", S, "tt_safeguarding", "2025-08-10", "2026-08-10", "EduSafe UK", "Current", "valid", 176),
        record("rec_chloe_firstaid", "staff_chloe", S, "tt_first_aid", "2025-11-05", "2028-11-05", "St John", "Current", "valid", 994),
        record("rec_alice_firstaid", "staff_alice", N, "tt_first_aid", "2025-09-01", "2028-09-01", "St John", "Current", "valid", 928),
        record("rec_chloe_fire", "staff_chloe", S, "tt_fire_safety", "2025-10-15", "2026-10-15", "SafeCampus", "Current", "valid", 242),
        record("rec_dan_safe", "staff_dan", S, "tt_safeguarding", "2025-07-01", "2026-07-01", "EduSafe UK", "Current", "valid", 136),
        record("rec_dan_firstaid", "staff_dan", S, "tt_first_aid", "2025-06-10", "2028-06-10", "St John", "Current", "valid", 846),
        record("rec_dan_fire", "staff_dan", S, "tt_fire_safety", "2025-09-20", "2026-09-20", "SafeCampus", "Current", "valid", 217),
    ]
}

fn audit_logs(module: &str) -> Vec<SeedDoc> {
    vec![SeedDoc {
        id: "audit_seed_001",
        data: json!({
            "actorUserId": "seed-script",
            "action": "create",
            "entityType": "trainingRecord",
            "entityId": "rec_ben_safe",
            "moduleId": module,
            "createdAt": UPDATED_AT,
            "after": {"status": "expired", "staffId": "staff_ben"},
        }),
    }]
}

fn aggregates(seed_version: &str) -> Vec<SeedDoc> {
    let aggregate = |id: &'static str, compliant: u32, expiring: u32, non_compliant: u32| SeedDoc {
        id,
        data: json!({
            "compliantCount": compliant,
            "expiringSoonCount": expiring,
            "nonCompliantCount": non_compliant,
            "lastCalculatedAt": CALCULATED_AT,
            "version": 1,
            "source": "seed",
            "seedVersion": seed_version,
        }),
    };
    vec![
        aggregate("orgCompliance", 2, 1, 1),
        aggregate("school_school_north", 0, 1, 1),
        aggregate("school_school_south", 2, 0, 0),
    ]
}

pub struct StagingSeeder<S: DocumentStore> {
    store: Arc<S>,
    config: Arc<MigrationConfig>,
    project_id: String,
}

impl<S: DocumentStore> StagingSeeder<S> {
    pub fn new(store: Arc<S>, config: Arc<MigrationConfig>, project_id: impl Into<String>) -> Self {
        Self {
            store,
            config,
            project_id: project_id.into(),
        }
    }

    /// Write the staging dataset for `org` and summarise what was prepared.
    pub async fn seed(
        &self,
        org: &OrgId,
        layout: SeedLayout,
        dry_run: bool,
    ) -> CutoverResult<SeedSummary> {
        let module = self.config.module_id.as_str();
        let tenant = |name: &str| -> CutoverResult<CollectionPath> {
            Ok(CollectionPath::tenant_root(org, &CollectionName::parse(name)?))
        };
        let training = |name: &str| -> CutoverResult<CollectionPath> {
            let collection = CollectionName::parse(name)?;
            Ok(match layout {
                SeedLayout::Module => CollectionPath::module(org, &self.config.module_id, &collection),
                SeedLayout::Legacy => CollectionPath::tenant_root(org, &collection),
            })
        };

        let groups: Vec<(CollectionPath, Vec<SeedDoc>)> = vec![
            (tenant("schools")?, schools()),
            (tenant("users")?, users(org, module)),
            (tenant("staff")?, staff()),
            (training("trainingTypes")?, training_types()),
            (training("trainingRecords")?, training_records()),
            (training("auditLogs")?, audit_logs(module)),
            (tenant("aggregates")?, aggregates(&self.config.seed_version)),
        ];

        let totals = SeedTotals {
            docs_prepared: 0,
            schools: groups[0].1.len(),
            users: groups[1].1.len(),
            staff: groups[2].1.len(),
            training_types: groups[3].1.len(),
            training_records: groups[4].1.len(),
            audit_logs: groups[5].1.len(),
            aggregates: groups[6].1.len(),
            module_health: 1,
        };

        let mut docs: Vec<(DocumentPath, Value)> = vec![(
            DocumentPath::organisation(org),
            stamped(json!({
                "name": "Staging Pilot Federation A",
                "slug": "staging-pilot-fed-a",
                "status": "active",
            })),
        )];
        for (collection, items) in groups {
            for item in items {
                docs.push((collection.doc(&DocumentId::parse(item.id)?), item.data));
            }
        }
        docs.push((
            tenant("moduleHealth")?.doc(&DocumentId::parse(module)?),
            json!({
                "state": "red",
                "openRiskCount": 2,
                "lastCalculatedAt": CALCULATED_AT,
                "summary": "1 non-compliant staff, 1 expiring soon",
                "source": "seed",
                "seedVersion": self.config.seed_version,
            }),
        ));
        let docs_prepared = docs.len();

        if !dry_run {
            let mut writer = BatchWriter::new(self.store.as_ref(), self.config.batch_size);
            for (path, data) in docs {
                let data: Document = match data {
                    Value::Object(map) => map,
                    _ => Document::new(),
                };
                writer.push(WriteOp::SetMerge { path, data }).await?;
            }
            writer.finish().await?;
        }

        tracing::info!(
            org_id = %org,
            docs_prepared,
            dry_run,
            layout = ?layout,
            "Seeded staging organisation"
        );

        Ok(SeedSummary {
            version: self.config.seed_version.clone(),
            project_id: self.project_id.clone(),
            dry_run,
            org_id: org.clone(),
            totals: SeedTotals {
                docs_prepared,
                ..totals
            },
            written_at: Utc::now(),
        })
    }
}

//! Cutover Engine - Migration Operations
//!
//! Runtime and offline operations for moving a tenant-scoped collection
//! family from legacy tenant-root paths into a module namespace:
//!
//! - [`IdempotentWriter`]: phase-aware upserts with an idempotency ledger
//! - [`Reader`]: reads from the configured read mode
//! - [`BackfillRunner`]: bulk copy with post-write verification
//! - [`ParityReporter`]: read-only comparison gating the read cutover
//! - [`RetirementArchiver`]: archive and optionally delete legacy data
//! - [`StagingSeeder`]: deterministic staging dataset for rehearsals
//!
//! All operations are generic over [`cutover_storage::DocumentStore`].

pub mod backfill;
pub mod batch;
pub mod parity;
pub mod reader;
pub mod retire;
pub mod seed;
pub mod telemetry;
pub mod tenants;
pub mod writer;

pub use backfill::{BackfillOptions, BackfillRunner};
pub use batch::BatchWriter;
pub use parity::{ParityOptions, ParityReporter};
pub use reader::{ReadResult, Reader};
pub use retire::{RetirementArchiver, RetirementOptions};
pub use seed::{SeedLayout, StagingSeeder};
pub use telemetry::TelemetryEmitter;
pub use tenants::{for_each_tenant, resolve_tenants};
pub use writer::{IdempotentWriter, UpsertRequest, UpsertResult};

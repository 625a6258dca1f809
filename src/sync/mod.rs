//! The incremental ingestion engine.
//!
//! [`run_once`] walks every tenant through [`sync_tenant`], which repeats
//! fetch, ingest and cursor advance until the forum region is exhausted.
//!
//! Runs assume they are the only writer for a tenant. Overlapping runs for
//! the same tenant race on its cursor and must be prevented by whatever
//! triggers them.

mod backfill;
mod cursor;
mod driver;
mod ingest;
mod register;
mod tenant;

pub use backfill::{backfill_tenant, BackfillReport};
pub use cursor::{Advance, CursorPolicy, PaginationStrategy, StopReason};
pub use driver::{run_once, watch, RunSummary, TenantRun};
pub use ingest::{ingest_page, ingest_page_new_only, to_stored_post, IngestCounts};
pub use register::{register_tenant, Registration};
pub use tenant::{sync_tenant, validate_tenant, TenantReport};

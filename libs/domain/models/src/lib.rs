// [libs/domain/models/src/lib.rs]

pub mod agent;
pub mod cve;
pub mod digest;
pub mod finding;
pub mod queue;
pub mod scan;
pub mod tenant;

pub use agent::{Agent, AgentEnrollmentInfo, AgentStatus, HeartbeatReport, SystemInfoSnapshot};
pub use cve::{ComponentIdentifier, CveRecord};
pub use digest::sha256_hexadecimal_digest;
pub use finding::{Finding, FindingPriority};
pub use queue::{DeadLetterRecord, QueueCounters, QueueJob, TenantQueueDepth};
pub use scan::{DependencyRecord, EnrichmentStatus, ScanResultRecord, ScanSubmission};
pub use tenant::{EnrollmentToken, Tenant, TenantStatus};

//! Identities owned by the host CI system.
//!
//! The store never creates these; it only reads their identity to
//! denormalize it into each stored event and to scope deletions.

/// A build whose events are being stored.
pub trait Build: Send + Sync {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
    fn job_id(&self) -> i64;
    fn job_name(&self) -> &str;
    fn pipeline_id(&self) -> i64;
    fn pipeline_name(&self) -> &str;
    fn team_id(&self) -> i64;
    fn team_name(&self) -> &str;
}

/// A pipeline, used to scope bulk deletion.
pub trait Pipeline: Send + Sync {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
}

/// A team, used to scope bulk deletion.
pub trait Team: Send + Sync {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
}

//! TaskData trait - binds a payload type to a task name
//!
//! # Key points
//! - Associated constant (`const TASK`) instead of a string at every call site
//! - `DeserializeOwned` so the payload can be decoded from any event

use serde::de::DeserializeOwned;

/// TaskData is the payload of a `<task>.triggered` event
///
/// # Example
/// ```ignore
/// #[derive(Deserialize)]
/// struct Deployment {
///     #[serde(flatten)]
///     context: EventProperties,
///     image: String,
/// }
///
/// impl TaskData for Deployment {
///     const TASK: &'static str = "deployment";
/// }
/// ```
pub trait TaskData: DeserializeOwned + Send + Sync + 'static {
    /// Task name, the `<task>` of `sh.keptn.event.<task>.triggered`.
    const TASK: &'static str;
}

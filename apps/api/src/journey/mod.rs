// Learning journey: the status of projects a user works on after the
// assessment. Only the submission status machine lives here.

pub mod handlers;
pub mod project_status;

pub use project_status::ProjectTracker;

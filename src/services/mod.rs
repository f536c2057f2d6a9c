pub mod class_service;
pub mod test_service;

pub use class_service::{group_by_term, plan_weeks, ClassService, TermClasses};
pub use test_service::{result_weeks, TestService};

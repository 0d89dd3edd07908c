pub mod achievement;
pub mod dashboard;
pub mod streak;

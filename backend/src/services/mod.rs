pub mod activity;

pub use activity::ActivityEntryBuilder;

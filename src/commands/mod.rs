pub mod check;
pub mod notify;
pub mod rescore;
pub mod run;
pub mod setup;
pub mod summary;
pub mod top;

// Re-export command functions for convenience
pub use check::check;
pub use notify::test_notify;
pub use rescore::rescore;
pub use run::run;
pub use summary::summary;
pub use top::{stats, top};

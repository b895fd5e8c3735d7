pub mod alert;
pub mod cache;
pub mod market;
pub mod report;
pub mod run;
pub mod series;

pub use alert::*;
pub use cache::*;
pub use market::*;
pub use report::*;
pub use run::*;
pub use series::*;

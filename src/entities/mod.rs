//! Record type definitions

pub mod a3;
pub mod account;
pub mod bowler;
pub mod email;
pub mod metric;
pub mod workspace;

pub use a3::{A3Case, A3Status, ActionItem, ActionStatus};
pub use account::{Account, AccountRole, PublicProfile, Session};
pub use bowler::{Bowler, Dashboard};
pub use email::EmailJob;
pub use metric::{Attribute, Metric, MonthlyEntry, TargetRule};
pub use workspace::{SavePayload, UserData};

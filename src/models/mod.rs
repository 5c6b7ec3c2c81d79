mod task;
mod team_task;
mod user;

pub use task::PersonalTask;
pub use team_task::{Member, TeamTask};
pub use user::User;

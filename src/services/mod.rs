pub mod comments;
pub mod communities;
pub mod counters;
pub mod leaderboard;
pub mod posts;
pub mod users;
pub mod votes;

pub use comments::CommentService;
pub use communities::CommunityService;
pub use counters::CounterService;
pub use leaderboard::LeaderboardService;
pub use posts::PostService;
pub use users::UserService;
pub use votes::VoteService;

pub mod comments;
pub mod communities;
pub mod counters;
pub mod posts;
pub mod users;
pub mod votes;

pub use comments::CommentRepository;
pub use communities::CommunityRepository;
pub use counters::CounterStore;
pub use posts::PostRepository;
pub use users::UserRepository;
pub use votes::VoteRepository;

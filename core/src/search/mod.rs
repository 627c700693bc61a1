//! Configuration search: state codec, reward shaping, and the Q-learning
//! engine that drives the clustering action library.

pub mod context;
pub mod engine;
pub mod reward;
pub mod space;

pub use self::context::{SearchConfig, SearchContext};
pub use self::engine::{SearchEngine, SearchOutcome};
pub use self::reward::immediate_reward;
pub use self::space::{Action, Configuration, ConfigurationSpace, ConfigurationState};

mod handler;
mod model;

pub use handler::{available_polls, poll_results, results_polls, vote};
pub use model::{
    GroupPoll, MAX_OPTIONS, MIN_OPTIONS, NewPoll, OptionResult, OptionTally, Poll, PollOption,
    PollStatus, PollUpdate, ResultsView, VoteRequest,
};

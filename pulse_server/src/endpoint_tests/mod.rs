mod helpers;
mod misc;
mod orders;
mod payments;
mod pulse;
mod quotes;
mod session;

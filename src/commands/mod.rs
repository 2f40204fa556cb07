pub mod chunk;
pub mod clean;
pub mod embed;
pub mod extract;
pub mod search;
pub mod status;
pub mod synth;
pub mod topic;

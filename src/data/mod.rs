pub mod types;

pub use types::{mean_spot, Bar, ChainRow, Greeks, OptionType};

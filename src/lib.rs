#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

mod ballot;
mod blind;
mod error;
mod paillier;
mod poll;
mod proof;
mod registry;
mod serde_hex;
mod store;
mod tally;

pub use ballot::*;
pub use blind::*;
pub use error::*;
pub use paillier::*;
pub use poll::*;
pub use proof::*;
pub use registry::*;
pub use serde_hex::*;
pub use store::*;
pub use tally::*;

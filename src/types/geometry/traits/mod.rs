mod bounded;

pub use bounded::*;

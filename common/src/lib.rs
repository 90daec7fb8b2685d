mod playtime;
mod roster;

pub use playtime::*;
pub use roster::*;

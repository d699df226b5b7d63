pub mod mpn;
pub mod utils;

pub mod amm_math;
pub mod confidential_spl;
pub mod encryption;

pub use amm_math::*;
pub use confidential_spl::*;
pub use encryption::*;

pub mod hierarchy;
pub mod skeleton;
pub mod chain;
pub mod constraints;
pub mod ik;
pub mod pose;
pub mod rig;

pub use hierarchy::*;
pub use skeleton::*;
pub use chain::*;
pub use constraints::*;
pub use ik::*;
pub use pose::*;
pub use rig::*;

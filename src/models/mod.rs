pub mod decision;
pub mod enums;
pub mod progress;
pub mod record;
pub mod stock;

pub use decision::*;
pub use enums::*;
pub use progress::*;
pub use record::*;
pub use stock::*;

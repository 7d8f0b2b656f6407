pub mod category;
pub mod error;
pub mod ids;
pub mod model;
pub mod part;
pub mod ship;

pub use category::*;
pub use error::*;
pub use ids::*;
pub use model::*;
pub use part::*;
pub use ship::*;

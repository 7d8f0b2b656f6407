pub mod ctx;
pub mod db;
pub mod db_model_manager;
pub mod inventory_bmc;
pub mod location_bmc;
pub mod matrix_bmc;
pub mod org_bmc;
pub mod ship_bmc;
pub mod site_bmc;

pub use ctx::*;
pub use db::*;
pub use db_model_manager::*;
pub use inventory_bmc::*;
pub use location_bmc::*;
pub use matrix_bmc::*;
pub use org_bmc::*;
pub use ship_bmc::*;
pub use site_bmc::*;

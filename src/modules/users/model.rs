pub use rollcall_models::users::*;

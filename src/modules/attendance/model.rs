pub use rollcall_models::attendance::*;

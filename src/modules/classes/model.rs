pub use rollcall_models::classes::*;

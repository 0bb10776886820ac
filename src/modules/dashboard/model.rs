pub use rollcall_models::dashboard::*;

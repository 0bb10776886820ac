pub use rollcall_models::auth::*;

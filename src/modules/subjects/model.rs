pub use rollcall_models::subjects::*;

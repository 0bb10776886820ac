pub use rollcall_models::schedules::*;

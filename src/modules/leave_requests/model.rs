pub use rollcall_models::leave_requests::*;

/// An uploaded evidence file as received from the multipart form.
#[derive(Debug, Clone)]
pub struct EvidenceUpload {
    pub filename: String,
    pub content: Vec<u8>,
}

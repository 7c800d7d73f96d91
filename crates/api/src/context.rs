use tenderdesk_core::AdminId;

/// Admin context for a request.
///
/// The identity is an opaque id minted by the external auth collaborator; it
/// is recorded (e.g. as a tender's creator) and not validated further here.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdminContext {
    admin_id: AdminId,
}

impl AdminContext {
    pub fn new(admin_id: AdminId) -> Self {
        Self { admin_id }
    }

    pub fn admin_id(&self) -> AdminId {
        self.admin_id
    }
}

pub mod admin_action;
pub mod allocation;
pub mod attribute;
pub mod change_request;
pub mod note;
pub mod project;
pub mod resource;
pub mod status;

pub use admin_action::AdminAction;
pub use allocation::{Allocation, AllocationUser};
pub use attribute::{AllocationAttribute, AttributeDetail, AttributeKind, AttributeType};
pub use change_request::{AllocationChangeRequest, AttributeChangeRequest};
pub use note::AllocationNote;
pub use project::{Project, ProjectRole, ProjectUser};
pub use resource::Resource;
pub use status::{
    AllocationStatus, AllocationUserStatus, ChangeRequestStatus, ProjectStatus, ProjectUserStatus,
};
